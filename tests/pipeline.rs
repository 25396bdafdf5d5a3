mod common;

use docx_theme::{
    DOCUMENT_PART, Error, STYLES_PART, StageOutcome, Theme, apply_theme, apply_theme_to_file,
    apply_theme_with_report, default_theme, validate_theme,
};
use rayon::prelude::*;
use serde_json::{Value, json};

use common::*;

fn theme(overrides: Value) -> Theme {
    let Value::Object(raw) = overrides else {
        panic!("theme overrides must be an object");
    };
    validate_theme(&raw)
}

fn applied(outcome: &StageOutcome) -> Vec<&'static str> {
    match outcome {
        StageOutcome::Applied(parts) => parts.clone(),
        other => panic!("expected Applied, got {other:?}"),
    }
}

fn sample_body() -> String {
    format!(
        "{}{}{}",
        paragraph("Inventory 📦"),
        table(&[&["Name", "Count"], &["apple", "many"], &["pear", "few"]]),
        paragraph("End of report"),
    )
}

#[test]
fn end_to_end_table_theme() {
    let _ = env_logger::try_init();

    let baseline = docx(&sample_body(), Some(DEFAULT_STYLES));
    let theme = theme(json!({
        "tableHeaderBackground": "112233",
        "tableBorderWidth": 8,
        "tableCenterAlign": true,
    }));
    let (out, report) = apply_theme_with_report(&baseline, &theme).unwrap();

    assert_eq!(applied(&report.tables), [DOCUMENT_PART]);
    assert_eq!(applied(&report.fonts), [STYLES_PART, DOCUMENT_PART]);

    let document = read_text(&out, DOCUMENT_PART);
    let doc = roxmltree::Document::parse(&document).unwrap();
    let tbl = w_descendants(doc.root_element(), "tbl")[0];
    let tbl_pr = w(tbl, "tblPr").unwrap();
    assert_eq!(w_val(tbl_pr, "jc"), Some("center"));
    for side in w(tbl_pr, "tblBorders").unwrap().children().filter(|n| n.is_element()) {
        assert_eq!(w_attr(side, "sz"), Some("8"));
    }
    let header_cell = w(w(tbl, "tr").unwrap(), "tc").unwrap();
    let shd = w(w(header_cell, "tcPr").unwrap(), "shd").unwrap();
    assert_eq!(w_attr(shd, "fill"), Some("112233"));

    let styles = read_text(&out, STYLES_PART);
    assert!(styles.contains(r#"w:cs="Segoe UI Emoji""#));
}

#[test]
fn untouched_parts_pass_through() {
    let baseline = docx(&sample_body(), Some(DEFAULT_STYLES));
    let out = apply_theme(&baseline, &default_theme()).unwrap();

    assert_eq!(part_names(&out), part_names(&baseline));
    for name in [
        "[Content_Types].xml",
        "_rels/.rels",
        "word/_rels/document.xml.rels",
        "word/media/image1.png",
    ] {
        assert_eq!(read_part(&out, name), read_part(&baseline, name), "{name}");
    }
}

#[test]
fn corrupt_baseline_fails() {
    let err = apply_theme(b"PK\x03\x04 truncated", &default_theme()).err();
    assert!(matches!(err, Some(Error::InvalidDocx(_))), "{err:?}");
}

#[test]
fn malformed_document_skips_table_stage() {
    let broken = r#"<?xml version="1.0"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:tbl>"#;
    let styles = styles_xml(DEFAULT_STYLES);
    let baseline = build_zip(&[
        (DOCUMENT_PART, broken.as_bytes()),
        (STYLES_PART, styles.as_bytes()),
    ]);
    let (out, report) = apply_theme_with_report(&baseline, &default_theme()).unwrap();

    assert!(
        matches!(report.tables, StageOutcome::Skipped(Error::Xml(_))),
        "{:?}",
        report.tables
    );
    assert_eq!(applied(&report.fonts), [STYLES_PART]);
    assert_eq!(read_part(&out, DOCUMENT_PART), broken.as_bytes());
    assert_ne!(read_text(&out, STYLES_PART), styles);
}

#[test]
fn missing_parts_are_skipped() {
    let baseline = docx(&paragraph("party 🎉"), None);
    let (out, report) = apply_theme_with_report(&baseline, &default_theme()).unwrap();
    assert!(matches!(report.tables, StageOutcome::Unchanged));
    assert_eq!(applied(&report.fonts), [DOCUMENT_PART]);
    assert_eq!(part_names(&out), part_names(&baseline));

    let styles = styles_xml(DEFAULT_STYLES);
    let baseline = build_zip(&[(STYLES_PART, styles.as_bytes())]);
    let (out, report) = apply_theme_with_report(&baseline, &default_theme()).unwrap();
    assert!(
        matches!(&report.tables, StageOutcome::Skipped(Error::PartMissing(name)) if name == DOCUMENT_PART),
        "{:?}",
        report.tables
    );
    assert_eq!(applied(&report.fonts), [STYLES_PART]);
    assert_eq!(part_names(&out), [STYLES_PART]);
}

#[test]
fn plain_document_tables_unchanged() {
    let baseline = docx(&paragraph("just words"), Some(DEFAULT_STYLES));
    let (out, report) = apply_theme_with_report(&baseline, &default_theme()).unwrap();
    assert!(!report.tables.is_applied());
    assert!(matches!(report.tables, StageOutcome::Unchanged));
    assert_eq!(applied(&report.fonts), [STYLES_PART]);
    assert_eq!(read_part(&out, DOCUMENT_PART), read_part(&baseline, DOCUMENT_PART));
}

#[test]
fn non_utf8_document_skipped() {
    let styles = styles_xml(DEFAULT_STYLES);
    let baseline = build_zip(&[
        (DOCUMENT_PART, &[0xff, 0xfe, b'<'][..]),
        (STYLES_PART, styles.as_bytes()),
    ]);
    let (out, report) = apply_theme_with_report(&baseline, &default_theme()).unwrap();
    assert!(matches!(
        report.tables,
        StageOutcome::Skipped(Error::InvalidDocx(_))
    ));
    assert_eq!(read_part(&out, DOCUMENT_PART), [0xff, 0xfe, b'<']);
}

#[test]
fn theming_twice_is_stable() {
    let baseline = docx(&sample_body(), Some(DEFAULT_STYLES));
    let theme = theme(json!({ "tableAltRowEnabled": true }));
    let once = apply_theme(&baseline, &theme).unwrap();
    let twice = apply_theme(&once, &theme).unwrap();
    for name in [DOCUMENT_PART, STYLES_PART] {
        assert_eq!(read_text(&twice, name), read_text(&once, name), "{name}");
    }
}

#[test]
fn output_is_deterministic_across_threads() {
    let baseline = docx(&sample_body(), Some(DEFAULT_STYLES));
    let theme = theme(json!({ "border": "333333", "tableAltRowEnabled": true }));
    let expected = apply_theme(&baseline, &theme).unwrap();

    let outputs: Vec<Vec<u8>> = (0..32)
        .into_par_iter()
        .map(|_| apply_theme(&baseline, &theme).unwrap())
        .collect();
    for out in outputs {
        assert_eq!(out, expected);
    }
}

#[test]
fn themes_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("report.docx");
    let output = dir.path().join("report.themed.docx");
    std::fs::write(&input, docx(&sample_body(), Some(DEFAULT_STYLES))).unwrap();

    let report = apply_theme_to_file(&input, &output, &default_theme()).unwrap();
    assert!(report.tables.is_applied());
    let out = std::fs::read(&output).unwrap();
    assert!(read_text(&out, DOCUMENT_PART).contains("<w:tblBorders>"));

    let missing = dir.path().join("absent.docx");
    let err = apply_theme_to_file(&missing, &output, &default_theme()).err();
    assert!(matches!(err, Some(Error::Io(_))), "{err:?}");
}
