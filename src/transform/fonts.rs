use unicode_properties::UnicodeEmoji;

use crate::docx::xml::{Element, Node, XmlDocument};
use crate::docx::{WML_NS, Wml, is_wml, preserve_space};
use crate::error::Error;
use crate::theme::FontTheme;

use super::RPR_ORDER;

const STYLE_ORDER: &[&str] = &[
    "name",
    "aliases",
    "basedOn",
    "next",
    "link",
    "autoRedefine",
    "hidden",
    "uiPriority",
    "semiHidden",
    "unhideWhenUsed",
    "qFormat",
    "locked",
    "personal",
    "personalCompose",
    "personalReply",
    "rsid",
    "pPr",
    "rPr",
    "tblPr",
    "trPr",
    "tcPr",
    "tblStylePr",
];

const DOC_DEFAULTS_ORDER: &[&str] = &["rPrDefault", "pPrDefault"];

/// Whether `c` has the Unicode `Emoji` property.
///
/// This is the broad property, so keycap bases (`0`-`9`, `#`, `*`) and `©`/`®`
/// count as emoji too. The Unicode version is the one `unicode-properties` ships.
pub fn is_emoji(c: char) -> bool {
    c.is_emoji_char()
}

/// Characters that carry no glyph of their own but belong to the emoji
/// sequence they follow: ZWJ, VS16, combining keycap and tag characters.
fn is_sequence_glue(c: char) -> bool {
    matches!(c, '\u{200D}' | '\u{FE0F}' | '\u{20E3}' | '\u{E0020}'..='\u{E007F}')
}

/// Splits `text` into maximal emoji and non-emoji segments, in order.
/// Concatenating the segments gives back `text`.
pub fn emoji_segments(text: &str) -> Vec<(bool, &str)> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut current: Option<bool> = None;
    for (i, c) in text.char_indices() {
        let emoji = is_emoji(c) || (current == Some(true) && is_sequence_glue(c));
        match current {
            Some(kind) if kind != emoji => {
                segments.push((kind, &text[start..i]));
                start = i;
            }
            _ => {}
        }
        current = Some(emoji);
    }
    if let Some(kind) = current {
        segments.push((kind, &text[start..]));
    }
    segments
}

/// Sets the document-wide default and "Normal" style fonts in `word/styles.xml`.
pub fn apply_default_fonts_xml(styles_xml: &str, fonts: &FontTheme) -> Result<String, Error> {
    let mut doc = XmlDocument::parse(styles_xml)?;
    apply_default_fonts(&mut doc, fonts)?;
    doc.to_xml()
}

pub(crate) fn apply_default_fonts(doc: &mut XmlDocument, fonts: &FontTheme) -> Result<(), Error> {
    if !is_wml(&doc.root, "styles") {
        return Err(Error::Transform(format!(
            "styles part has root <{}>, expected <w:styles>",
            doc.root.name
        )));
    }
    let wml = Wml::for_document(doc);
    let root = &mut doc.root;

    let doc_defaults =
        root.child_or_insert_with(WML_NS, "docDefaults", || wml.el("docDefaults"), Element::prepend);
    let r_pr_default = doc_defaults.child_or_insert_with(
        WML_NS,
        "rPrDefault",
        || wml.el("rPrDefault"),
        |parent, child| parent.insert_ordered(child, DOC_DEFAULTS_ORDER),
    );
    let r_pr = r_pr_default.child_or_insert_with(WML_NS, "rPr", || wml.el("rPr"), Element::prepend);
    set_theme_fonts(r_pr, fonts, &wml);

    let mut normal_styles = 0;
    for style in root
        .elements_mut()
        .filter(|e| is_wml(e, "style") && e.attr(Some(WML_NS), "styleId") == Some("Normal"))
    {
        let r_pr = style.child_or_insert_with(
            WML_NS,
            "rPr",
            || wml.el("rPr"),
            |parent, child| parent.insert_ordered(child, STYLE_ORDER),
        );
        set_theme_fonts(r_pr, fonts, &wml);
        normal_styles += 1;
    }
    if normal_styles == 0 {
        log::debug!("No Normal style in styles part, only document defaults updated");
    }
    Ok(())
}

fn set_theme_fonts(r_pr: &mut Element, fonts: &FontTheme, wml: &Wml) {
    r_pr.remove_children(WML_NS, &["rFonts"]);
    r_pr.insert_ordered(
        wml.el_with(
            "rFonts",
            &[
                ("ascii", fonts.ascii.as_str()),
                ("eastAsia", fonts.east_asia.as_str()),
                ("hAnsi", fonts.h_ansi.as_str()),
                ("cs", fonts.symbol.as_str()),
                ("hint", "eastAsia"),
            ],
        ),
        RPR_ORDER,
    );
}

/// Splits body runs so emoji text is set in the symbol font.
///
/// Returns `body_xml` unchanged when no run contains emoji.
pub fn split_emoji_runs_xml(body_xml: &str, fonts: &FontTheme) -> Result<String, Error> {
    let mut doc = XmlDocument::parse(body_xml)?;
    let split = split_emoji_runs(&mut doc, fonts);
    log::debug!("Split {split} runs containing emoji");
    if split == 0 {
        return Ok(body_xml.to_string());
    }
    doc.to_xml()
}

pub(crate) fn split_emoji_runs(doc: &mut XmlDocument, fonts: &FontTheme) -> usize {
    let wml = Wml::for_document(doc);
    split_runs_in(&mut doc.root, fonts, &wml)
}

fn split_runs_in(parent: &mut Element, fonts: &FontTheme, wml: &Wml) -> usize {
    let mut split = 0;
    let children = std::mem::take(&mut parent.children);
    let mut out = Vec::with_capacity(children.len());
    for node in children {
        match node {
            Node::Element(run) if is_wml(&run, "r") && run_has_emoji(&run) => {
                split += 1;
                out.extend(split_run(run, fonts, wml).into_iter().map(Node::Element));
            }
            Node::Element(mut el) => {
                // Runs can hold text boxes whose own runs need the same treatment.
                split += split_runs_in(&mut el, fonts, wml);
                out.push(Node::Element(el));
            }
            other => out.push(other),
        }
    }
    parent.children = out;
    split
}

fn run_has_emoji(run: &Element) -> bool {
    run.elements()
        .filter(|e| !is_wml(e, "rPr"))
        .any(|e| e.own_text().chars().any(is_emoji))
}

/// Run properties for emoji text: the run's own properties without fonts or
/// color, plus the symbol font in every slot and automatic color.
fn emoji_properties(plain: Option<&Element>, fonts: &FontTheme, wml: &Wml) -> Element {
    let mut props = plain.cloned().unwrap_or_else(|| wml.el("rPr"));
    props.remove_children(WML_NS, &["rFonts", "color"]);
    let symbol = fonts.symbol.as_str();
    props.insert_ordered(
        wml.el_with(
            "rFonts",
            &[
                ("ascii", symbol),
                ("eastAsia", symbol),
                ("hAnsi", symbol),
                ("cs", symbol),
                ("hint", "default"),
            ],
        ),
        RPR_ORDER,
    );
    props.insert_ordered(wml.val("color", "auto"), RPR_ORDER);
    props
}

fn split_run(mut run: Element, fonts: &FontTheme, wml: &Wml) -> Vec<Element> {
    let plain = run.child(WML_NS, "rPr").cloned();
    let emoji = emoji_properties(plain.as_ref(), fonts, wml);

    if !run.elements().any(|e| is_wml(e, "t")) {
        // Emoji outside any w:t: keep the run whole and switch its properties.
        run.remove_children(WML_NS, &["rPr"]);
        run.prepend(emoji);
        return vec![run];
    }

    let new_run = |props: Option<&Element>, content: Vec<Node>| {
        let mut r = run.empty_copy();
        if let Some(props) = props {
            r.children.push(Node::Element(props.clone()));
        }
        r.children.extend(content);
        r
    };

    let mut runs = Vec::new();
    let mut pending: Vec<Node> = Vec::new();
    for child in run.elements().filter(|e| !is_wml(e, "rPr")) {
        if !is_wml(child, "t") {
            let mut child = child.clone();
            split_runs_in(&mut child, fonts, wml);
            pending.push(Node::Element(child));
            continue;
        }
        if !pending.is_empty() {
            runs.push(new_run(plain.as_ref(), std::mem::take(&mut pending)));
        }
        let text = child.own_text();
        for (is_emoji_text, segment) in emoji_segments(&text) {
            let mut t = child.empty_copy();
            preserve_space(&mut t);
            t.children.push(Node::Text(segment.to_string()));
            let props = if is_emoji_text { Some(&emoji) } else { plain.as_ref() };
            runs.push(new_run(props, vec![Node::Element(t)]));
        }
    }
    if !pending.is_empty() {
        runs.push(new_run(plain.as_ref(), pending));
    }

    if runs.is_empty() {
        return vec![run];
    }
    runs
}
