//! Themeable properties, their defaults, and validation of user input.
//!
//! The schema is the single source of truth: a [`Theme`] always holds exactly
//! one value per schema field, and user input only ever reaches generated XML
//! after passing the per-field checks in [`validate_theme`].

use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Category {
    Colors,
    Sizes,
    Options,
    Fonts,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    /// Six hex digits, no leading `#`.
    Color { default: &'static str },
    /// Integer in half-points or twentieths of a point, depending on the field.
    Number { default: u32, min: u32, max: u32 },
    Flag { default: bool },
    /// Font family name.
    Font { default: &'static str },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub category: Category,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn default_value(&self) -> ThemeValue {
        match self.kind {
            FieldKind::Color { default } => ThemeValue::Color(default.to_string()),
            FieldKind::Number { default, .. } => ThemeValue::Number(default),
            FieldKind::Flag { default } => ThemeValue::Flag(default),
            FieldKind::Font { default } => ThemeValue::Font(default.to_string()),
        }
    }

    fn type_name(&self) -> &'static str {
        match self.kind {
            FieldKind::Color { .. } => "color",
            FieldKind::Number { .. } => "number",
            FieldKind::Flag { .. } => "boolean",
            FieldKind::Font { .. } => "string",
        }
    }

    fn coerce(&self, raw: &Value) -> Option<ThemeValue> {
        match self.kind {
            FieldKind::Color { .. } => color_text(raw)
                .and_then(|s| normalize_color(&s))
                .map(ThemeValue::Color),
            FieldKind::Number { min, max, .. } => parse_int(raw)
                .filter(|n| (i64::from(min)..=i64::from(max)).contains(n))
                .and_then(|n| u32::try_from(n).ok())
                .map(ThemeValue::Number),
            FieldKind::Flag { .. } => Some(ThemeValue::Flag(truthy(raw))),
            // Font keys are not user-settable; input never replaces the default.
            FieldKind::Font { .. } => Some(self.default_value()),
        }
    }
}

const fn color(key: &'static str, label: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        label,
        category: Category::Colors,
        kind: FieldKind::Color { default },
    }
}

const fn size(key: &'static str, label: &'static str, default: u32, min: u32, max: u32) -> FieldSpec {
    FieldSpec {
        key,
        label,
        category: Category::Sizes,
        kind: FieldKind::Number { default, min, max },
    }
}

const fn option(key: &'static str, label: &'static str, default: bool) -> FieldSpec {
    FieldSpec {
        key,
        label,
        category: Category::Options,
        kind: FieldKind::Flag { default },
    }
}

const fn font(key: &'static str, label: &'static str, default: &'static str) -> FieldSpec {
    FieldSpec {
        key,
        label,
        category: Category::Fonts,
        kind: FieldKind::Font { default },
    }
}

/// Body shading equal to this is the generator's own default and is not emitted.
pub const DEFAULT_BODY_BACKGROUND: &str = "FFFFFF";

pub static SCHEMA: &[FieldSpec] = &[
    color("heading1", "Heading 1 color", "2F5597"),
    color("heading2", "Heading 2 color", "5B9BD5"),
    color("heading3", "Heading 3 color", "44546A"),
    color("heading4", "Heading 4 color", "44546A"),
    color("heading5", "Heading 5 color", "44546A"),
    color("heading6", "Heading 6 color", "44546A"),
    color("link", "Link color", "0563C1"),
    color("code", "Code block text color", "032F62"),
    color("codespan", "Inline code color", "70AD47"),
    color("codeBackground", "Code background color", "F6F6F7"),
    color("blockquote", "Blockquote text color", "666666"),
    color("blockquoteBackground", "Blockquote background color", "F9F9F9"),
    color("del", "Strikethrough color", "FF0000"),
    color("tag", "HTML tag color", "ED7D31"),
    color("html", "HTML content color", "4472C4"),
    color("tableHeaderBackground", "Table header background", "F2F2F2"),
    color("tableHeaderTextColor", "Table header text color", "000000"),
    color("tableBodyBackground", "Table body background", "FFFFFF"),
    color("tableAltRowBackground", "Banded row background", "F9F9F9"),
    color("border", "Border color", "A5A5A5"),
    color("hr", "Horizontal rule color", "D9D9D9"),
    size("heading1Size", "Heading 1 size", 36, 12, 144),
    size("heading2Size", "Heading 2 size", 32, 12, 120),
    size("heading3Size", "Heading 3 size", 28, 12, 96),
    size("heading4Size", "Heading 4 size", 26, 12, 72),
    size("heading5Size", "Heading 5 size", 24, 12, 60),
    size("heading6Size", "Heading 6 size", 24, 12, 48),
    size("spaceSize", "Paragraph spacing", 12, 6, 48),
    size("codeSize", "Code size", 22, 8, 48),
    size("tableSize", "Table text size", 21, 14, 36),
    size("tableBorderWidth", "Table border width", 4, 1, 24),
    size("tableCellPadding", "Table cell padding", 80, 20, 300),
    option("linkUnderline", "Underline links", true),
    option("tableHeaderBold", "Bold table header", true),
    option("tableHeaderCenter", "Center table header text", true),
    option("tableAltRowEnabled", "Banded table rows", false),
    option("tableCenterAlign", "Center tables", true),
    font("eastAsia", "East Asian font", "Microsoft YaHei"),
    font("ascii", "Latin font", "Arial"),
    font("hAnsi", "Latin high-ANSI font", "Arial"),
    font("symbol", "Symbol/emoji font", "Segoe UI Emoji"),
];

pub fn field(key: &str) -> Option<&'static FieldSpec> {
    SCHEMA.iter().find(|f| f.key == key)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ThemeValue {
    Color(String),
    Number(u32),
    Flag(bool),
    Font(String),
}

impl ThemeValue {
    fn to_json(&self) -> Value {
        match self {
            ThemeValue::Color(s) | ThemeValue::Font(s) => Value::String(s.clone()),
            ThemeValue::Number(n) => Value::from(*n),
            ThemeValue::Flag(b) => Value::Bool(*b),
        }
    }
}

/// A validated theme: one value per [`SCHEMA`] field, in schema order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Theme {
    values: Vec<ThemeValue>,
}

impl Default for Theme {
    fn default() -> Self {
        default_theme()
    }
}

impl Serialize for Theme {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (spec, value) in SCHEMA.iter().zip(&self.values) {
            map.serialize_entry(spec.key, value)?;
        }
        map.end()
    }
}

impl Theme {
    /// Parses the wire format (a flat JSON object). Anything that is not a JSON
    /// object leaves every field at its default.
    pub fn from_json_str(json: &str) -> Theme {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(raw)) => validate_theme(&raw),
            Ok(other) => {
                log::warn!("Theme is not a JSON object ({other}), using defaults");
                default_theme()
            }
            Err(e) => {
                log::warn!("Theme JSON could not be parsed ({e}), using defaults");
                default_theme()
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ThemeValue> {
        let index = SCHEMA.iter().position(|f| f.key == key)?;
        self.values.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ThemeValue)> {
        SCHEMA.iter().map(|f| f.key).zip(&self.values)
    }

    pub fn to_json(&self) -> Map<String, Value> {
        self.iter()
            .map(|(key, value)| (key.to_string(), value.to_json()))
            .collect()
    }

    /// Re-validates this theme with `overrides` layered on top.
    pub fn merged(&self, overrides: &Map<String, Value>) -> Theme {
        let mut raw = self.to_json();
        raw.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        validate_theme(&raw)
    }

    fn text(&self, key: &str) -> &str {
        match self.get(key) {
            Some(ThemeValue::Color(s) | ThemeValue::Font(s)) => s,
            _ => "",
        }
    }

    fn number(&self, key: &str) -> u32 {
        match self.get(key) {
            Some(ThemeValue::Number(n)) => *n,
            _ => 0,
        }
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(ThemeValue::Flag(true)))
    }

    pub fn table_style(&self) -> TableTheme {
        TableTheme {
            border_color: self.text("border").to_string(),
            border_width: self.number("tableBorderWidth"),
            header_background: self.text("tableHeaderBackground").to_string(),
            header_text_color: self.text("tableHeaderTextColor").to_string(),
            body_background: self.text("tableBodyBackground").to_string(),
            alt_row_background: self.text("tableAltRowBackground").to_string(),
            font_size: self.number("tableSize"),
            cell_padding: self.number("tableCellPadding"),
            header_bold: self.flag("tableHeaderBold"),
            header_center: self.flag("tableHeaderCenter"),
            banded_rows: self.flag("tableAltRowEnabled"),
            center_align: self.flag("tableCenterAlign"),
        }
    }

    pub fn font_set(&self) -> FontTheme {
        FontTheme {
            ascii: self.text("ascii").to_string(),
            east_asia: self.text("eastAsia").to_string(),
            h_ansi: self.text("hAnsi").to_string(),
            symbol: self.text("symbol").to_string(),
        }
    }
}

/// Table-related theme values, in OOXML units.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableTheme {
    pub border_color: String,
    /// Eighths of a point.
    pub border_width: u32,
    pub header_background: String,
    pub header_text_color: String,
    pub body_background: String,
    pub alt_row_background: String,
    /// Half-points.
    pub font_size: u32,
    /// Twentieths of a point.
    pub cell_padding: u32,
    pub header_bold: bool,
    pub header_center: bool,
    pub banded_rows: bool,
    pub center_align: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontTheme {
    pub ascii: String,
    pub east_asia: String,
    pub h_ansi: String,
    /// Used for emoji runs and as the complex-script fallback.
    pub symbol: String,
}

pub fn default_theme() -> Theme {
    Theme {
        values: SCHEMA.iter().map(FieldSpec::default_value).collect(),
    }
}

/// Builds a theme from untrusted input.
///
/// Walks the schema, not the input: unknown keys are dropped and every invalid
/// value falls back to that field's default. Never fails.
pub fn validate_theme(raw: &Map<String, Value>) -> Theme {
    for key in raw.keys().filter(|k| field(k).is_none()) {
        log::debug!("Ignoring unknown theme key {key:?}");
    }

    let values = SCHEMA
        .iter()
        .map(|spec| match raw.get(spec.key) {
            None => spec.default_value(),
            Some(value) => spec.coerce(value).unwrap_or_else(|| {
                log::warn!(
                    "Invalid value {value} for theme key {:?}, using default",
                    spec.key
                );
                spec.default_value()
            }),
        })
        .collect();

    Theme { values }
}

/// Strips one leading `#` and uppercases; `None` unless exactly six hex digits remain.
pub fn normalize_color(raw: &str) -> Option<String> {
    let hex = raw.strip_prefix('#').unwrap_or(raw).to_ascii_uppercase();
    (hex.len() == 6 && hex.bytes().all(|b| b.is_ascii_hexdigit())).then_some(hex)
}

fn color_text(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Integer parsing with `parseInt` leniency: leading whitespace, optional sign,
/// then as many digits as there are. Fractions truncate toward zero.
fn parse_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => {
            let s = s.trim_start();
            let (negative, digits) = match s.as_bytes().first() {
                Some(b'-') => (true, &s[1..]),
                Some(b'+') => (false, &s[1..]),
                _ => (false, s),
            };
            let end = digits
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(digits.len());
            let n = digits[..end].parse::<i64>().ok()?;
            Some(if negative { -n } else { n })
        }
        _ => None,
    }
}

fn truthy(raw: &Value) -> bool {
    match raw {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The schema grouped by category, as served to the theme editor.
pub fn schema_json() -> Value {
    let mut config = Map::new();
    for category in [
        Category::Colors,
        Category::Sizes,
        Category::Options,
        Category::Fonts,
    ] {
        let fields: Map<String, Value> = SCHEMA
            .iter()
            .filter(|f| f.category == category)
            .map(|f| {
                let mut entry = Map::new();
                entry.insert("label".into(), f.label.into());
                entry.insert("default".into(), f.default_value().to_json());
                entry.insert("type".into(), f.type_name().into());
                if let FieldKind::Number { min, max, .. } = f.kind {
                    entry.insert("min".into(), min.into());
                    entry.insert("max".into(), max.into());
                }
                (f.key.to_string(), Value::Object(entry))
            })
            .collect();
        let name = match category {
            Category::Colors => "colors",
            Category::Sizes => "sizes",
            Category::Options => "options",
            Category::Fonts => "fonts",
        };
        config.insert(name.to_string(), Value::Object(fields));
    }
    Value::Object(config)
}
