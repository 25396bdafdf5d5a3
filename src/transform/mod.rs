mod fonts;
mod table;

use std::panic::{self, AssertUnwindSafe};

use crate::docx::{DOCUMENT_PART, DocxPackage, STYLES_PART};
use crate::error::Error;
use crate::theme::Theme;

pub use fonts::{apply_default_fonts_xml, emoji_segments, is_emoji, split_emoji_runs_xml};
pub use table::{TableReport, style_tables_xml};

pub(crate) const RPR_ORDER: &[&str] = &[
    "rStyle",
    "rFonts",
    "b",
    "bCs",
    "i",
    "iCs",
    "caps",
    "smallCaps",
    "strike",
    "dstrike",
    "outline",
    "shadow",
    "emboss",
    "imprint",
    "noProof",
    "snapToGrid",
    "vanish",
    "webHidden",
    "color",
    "spacing",
    "w",
    "kern",
    "position",
    "sz",
    "szCs",
    "highlight",
    "u",
    "effect",
    "bdr",
    "shd",
    "fitText",
    "vertAlign",
    "rtl",
    "cs",
    "em",
    "lang",
    "eastAsianLayout",
    "specVanish",
    "oMath",
    "rPrChange",
];

pub(crate) const PPR_ORDER: &[&str] = &[
    "pStyle",
    "keepNext",
    "keepLines",
    "pageBreakBefore",
    "framePr",
    "widowControl",
    "numPr",
    "suppressLineNumbers",
    "pBdr",
    "shd",
    "tabs",
    "suppressAutoHyphens",
    "kinsoku",
    "wordWrap",
    "overflowPunct",
    "topLinePunct",
    "autoSpaceDE",
    "autoSpaceDN",
    "bidi",
    "adjustRightInd",
    "snapToGrid",
    "spacing",
    "ind",
    "contextualSpacing",
    "mirrorIndents",
    "suppressOverlap",
    "jc",
    "textDirection",
    "textAlignment",
    "textboxTightWrap",
    "outlineLvl",
    "divId",
    "cnfStyle",
    "rPr",
    "sectPr",
    "pPrChange",
];

/// What a stage did to the package.
#[derive(Debug)]
pub enum StageOutcome {
    /// These parts were rewritten.
    Applied(Vec<&'static str>),
    /// The stage ran but had nothing to change.
    Unchanged,
    /// The stage failed; the package is as it was before the stage.
    Skipped(Error),
}

impl StageOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, StageOutcome::Applied(_))
    }
}

#[derive(Debug)]
pub struct ThemeReport {
    pub tables: StageOutcome,
    pub fonts: StageOutcome,
}

type PartEdits = Vec<(&'static str, String)>;

/// Applies `theme` to a DOCX package.
///
/// Fails only when `baseline` cannot be opened as a package. A stage that
/// fails is skipped and the package keeps the state from the stage before.
pub fn apply_theme(baseline: &[u8], theme: &Theme) -> Result<Vec<u8>, Error> {
    apply_theme_with_report(baseline, theme).map(|(bytes, _)| bytes)
}

pub fn apply_theme_with_report(
    baseline: &[u8],
    theme: &Theme,
) -> Result<(Vec<u8>, ThemeReport), Error> {
    let mut package = DocxPackage::open(baseline)?;

    let tables = run_stage(&mut package, "table styles", theme, table_stage);
    let fonts = run_stage(&mut package, "fonts", theme, font_stage);
    let report = ThemeReport { tables, fonts };

    match package.serialize() {
        Ok(bytes) => Ok((bytes, report)),
        Err(e) => {
            log::error!("Could not write themed package, returning it unthemed: {e}");
            Ok((baseline.to_vec(), report))
        }
    }
}

fn run_stage(
    package: &mut DocxPackage,
    name: &str,
    theme: &Theme,
    stage: fn(&DocxPackage, &Theme) -> Result<PartEdits, Error>,
) -> StageOutcome {
    let result = panic::catch_unwind(AssertUnwindSafe(|| stage(package, theme)))
        .unwrap_or_else(|payload| Err(Error::Transform(panic_message(payload.as_ref()))));

    let outcome = match result.and_then(|edits| {
        let names: Vec<&'static str> = edits.iter().map(|(part, _)| *part).collect();
        package.set_parts(edits)?;
        Ok(names)
    }) {
        Ok(names) if names.is_empty() => StageOutcome::Unchanged,
        Ok(names) => StageOutcome::Applied(names),
        Err(e) => {
            log::warn!("Skipping {name} stage: {e}");
            StageOutcome::Skipped(e)
        }
    };
    log::debug!("Stage {name}: {outcome:?}");
    outcome
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "transformer panicked".to_string())
}

fn table_stage(package: &DocxPackage, theme: &Theme) -> Result<PartEdits, Error> {
    let body = package.part_text(DOCUMENT_PART)?;
    let (styled, report) = style_tables_xml(&body, &theme.table_style())?;
    if report.tables == 0 {
        return Ok(Vec::new());
    }
    Ok(vec![(DOCUMENT_PART, styled)])
}

/// Both halves run independently: a missing or broken part is logged and the
/// other part is still themed.
fn font_stage(package: &DocxPackage, theme: &Theme) -> Result<PartEdits, Error> {
    let fonts = theme.font_set();
    let mut edits = Vec::new();

    match package
        .part_text(STYLES_PART)
        .and_then(|styles| apply_default_fonts_xml(&styles, &fonts))
    {
        Ok(styled) => edits.push((STYLES_PART, styled)),
        Err(e) => log::warn!("Default fonts not applied: {e}"),
    }

    match package.part_text(DOCUMENT_PART).and_then(|body| {
        let split = split_emoji_runs_xml(&body, &fonts)?;
        Ok((split != body).then_some(split))
    }) {
        Ok(Some(split)) => edits.push((DOCUMENT_PART, split)),
        Ok(None) => {}
        Err(e) => log::warn!("Emoji runs not split: {e}"),
    }

    Ok(edits)
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;
    use crate::theme::default_theme;

    const BODY: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p/></w:body></w:document>"#;

    fn package() -> DocxPackage {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        zip.start_file(DOCUMENT_PART, options).unwrap();
        zip.write_all(BODY.as_bytes()).unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        DocxPackage::open(&bytes).unwrap()
    }

    fn panicking_stage(_: &DocxPackage, _: &Theme) -> Result<PartEdits, Error> {
        panic!("stage blew up")
    }

    fn half_written_stage(_: &DocxPackage, _: &Theme) -> Result<PartEdits, Error> {
        Ok(vec![
            (DOCUMENT_PART, "<w:document/>".to_string()),
            (STYLES_PART, "<w:styles/>".to_string()),
        ])
    }

    #[test]
    fn panicking_stage_is_skipped() {
        let mut package = package();
        let outcome = run_stage(&mut package, "panics", &default_theme(), panicking_stage);
        match outcome {
            StageOutcome::Skipped(Error::Transform(msg)) => assert!(msg.contains("stage blew up")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(package.part(DOCUMENT_PART).unwrap(), BODY.as_bytes());
    }

    #[test]
    fn edits_to_missing_parts_write_nothing() {
        let mut package = package();
        let outcome = run_stage(&mut package, "partial", &default_theme(), half_written_stage);
        assert!(matches!(outcome, StageOutcome::Skipped(Error::PartMissing(ref p)) if p == STYLES_PART));
        assert_eq!(package.part(DOCUMENT_PART).unwrap(), BODY.as_bytes());
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u32), "transformer panicked");
    }
}
