use crate::docx::xml::{Element, XmlDocument};
use crate::docx::{WML_NS, Wml, is_wml, wml, wml_bool};
use crate::error::Error;
use crate::theme::{DEFAULT_BODY_BACKGROUND, TableTheme};

use super::{PPR_ORDER, RPR_ORDER};

const TBL_PR_ORDER: &[&str] = &[
    "tblStyle",
    "tblpPr",
    "tblOverlap",
    "bidiVisual",
    "tblStyleRowBandSize",
    "tblStyleColBandSize",
    "tblW",
    "jc",
    "tblCellSpacing",
    "tblInd",
    "tblBorders",
    "shd",
    "tblLayout",
    "tblCellMar",
    "tblLook",
    "tblCaption",
    "tblDescription",
    "tblPrChange",
];

const TC_PR_ORDER: &[&str] = &[
    "cnfStyle",
    "tcW",
    "gridSpan",
    "hMerge",
    "vMerge",
    "tcBorders",
    "shd",
    "noWrap",
    "tcMar",
    "textDirection",
    "tcFitText",
    "vAlign",
    "hideMark",
    "headers",
    "cellIns",
    "cellDel",
    "cellMerge",
    "tcPrChange",
];

const BORDER_SIDES: [&str; 6] = ["top", "left", "bottom", "right", "insideH", "insideV"];
const MARGIN_SIDES: [&str; 4] = ["top", "left", "bottom", "right"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RowRole {
    Header,
    Body { banded: bool },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableReport {
    pub tables: usize,
    pub header_rows: usize,
    pub body_rows: usize,
    pub banded_rows: usize,
}

/// Rewrites every table in a `word/document.xml` body.
pub fn style_tables_xml(body_xml: &str, theme: &TableTheme) -> Result<(String, TableReport), Error> {
    let mut doc = XmlDocument::parse(body_xml)?;
    let report = style_tables(&mut doc, theme);
    log::debug!(
        "Styled {} tables ({} header rows, {} body rows, {} banded)",
        report.tables,
        report.header_rows,
        report.body_rows,
        report.banded_rows
    );
    if report.tables == 0 {
        return Ok((body_xml.to_string(), report));
    }
    Ok((doc.to_xml()?, report))
}

pub(crate) fn style_tables(doc: &mut XmlDocument, theme: &TableTheme) -> TableReport {
    let wml = Wml::for_document(doc);
    let mut report = TableReport::default();
    visit_tables(&mut doc.root, theme, &wml, &mut report);
    report
}

fn visit_tables(parent: &mut Element, theme: &TableTheme, wml: &Wml, report: &mut TableReport) {
    for child in parent.elements_mut() {
        if is_wml(child, "tbl") {
            style_table(child, theme, wml, report);
        }
        // Nested tables are styled on their own.
        visit_tables(child, theme, wml, report);
    }
}

fn style_table(tbl: &mut Element, theme: &TableTheme, wml: &Wml, report: &mut TableReport) {
    report.tables += 1;
    style_table_properties(tbl, theme, wml);

    let mut rows = Vec::new();
    collect_through_wrappers(tbl, "tr", &mut rows);
    let roles = assign_roles(rows.iter().map(|row| is_marked_header(row)), theme.banded_rows);

    for (row, role) in rows.into_iter().zip(roles) {
        match role {
            RowRole::Header => report.header_rows += 1,
            RowRole::Body { banded } => {
                report.body_rows += 1;
                report.banded_rows += usize::from(banded);
            }
        }
        let mut cells = Vec::new();
        collect_through_wrappers(row, "tc", &mut cells);
        for cell in cells {
            style_cell(cell, role, theme, wml);
        }
    }
}

fn style_table_properties(tbl: &mut Element, theme: &TableTheme, wml: &Wml) {
    let tbl_pr = tbl.child_or_insert_with(WML_NS, "tblPr", || wml.el("tblPr"), Element::prepend);
    tbl_pr.remove_children(WML_NS, &["tblBorders", "tblCellMar", "jc"]);

    if theme.center_align {
        tbl_pr.insert_ordered(wml.val("jc", "center"), TBL_PR_ORDER);
    }

    let width = theme.border_width.to_string();
    let mut borders = wml.el("tblBorders");
    for side in BORDER_SIDES {
        borders.insert_ordered(
            wml.el_with(
                side,
                &[
                    ("val", "single"),
                    ("sz", width.as_str()),
                    ("space", "0"),
                    ("color", theme.border_color.as_str()),
                ],
            ),
            &BORDER_SIDES,
        );
    }
    tbl_pr.insert_ordered(borders, TBL_PR_ORDER);

    let padding = theme.cell_padding.to_string();
    let mut margins = wml.el("tblCellMar");
    for side in MARGIN_SIDES {
        margins.insert_ordered(
            wml.el_with(side, &[("w", padding.as_str()), ("type", "dxa")]),
            &MARGIN_SIDES,
        );
    }
    tbl_pr.insert_ordered(margins, TBL_PR_ORDER);
}

fn is_marked_header(row: &Element) -> bool {
    wml(row, "trPr")
        .and_then(|pr| wml_bool(pr, "tblHeader"))
        .unwrap_or(false)
}

/// Pairs each row with its role. The first row and any row flagged as a
/// repeating header are headers; the rest are numbered from zero and banded on
/// even numbers when banding is on.
pub(crate) fn assign_roles(header_flags: impl IntoIterator<Item = bool>, banding: bool) -> Vec<RowRole> {
    let mut body_index = 0usize;
    header_flags
        .into_iter()
        .enumerate()
        .map(|(i, flagged)| {
            if i == 0 || flagged {
                return RowRole::Header;
            }
            let banded = banding && body_index % 2 == 0;
            body_index += 1;
            RowRole::Body { banded }
        })
        .collect()
}

fn style_cell(cell: &mut Element, role: RowRole, theme: &TableTheme, wml: &Wml) {
    let fill = match role {
        RowRole::Header => Some(theme.header_background.as_str()),
        RowRole::Body { banded: true } => Some(theme.alt_row_background.as_str()),
        RowRole::Body { banded: false } if theme.body_background != DEFAULT_BODY_BACKGROUND => {
            Some(theme.body_background.as_str())
        }
        RowRole::Body { .. } => None,
    };

    let tc_pr = cell.child_or_insert_with(WML_NS, "tcPr", || wml.el("tcPr"), Element::prepend);
    tc_pr.remove_children(WML_NS, &["shd"]);
    if let Some(fill) = fill {
        tc_pr.insert_ordered(
            wml.el_with("shd", &[("val", "clear"), ("color", "auto"), ("fill", fill)]),
            TC_PR_ORDER,
        );
    }

    if role == RowRole::Header {
        let mut paragraphs = Vec::new();
        collect_in_cell(cell, "p", &mut paragraphs);
        for paragraph in paragraphs {
            align_header_paragraph(paragraph, theme, wml);
        }
    }

    let mut runs = Vec::new();
    collect_in_cell(cell, "r", &mut runs);
    for run in runs {
        style_cell_run(run, role, theme, wml);
    }
}

fn align_header_paragraph(paragraph: &mut Element, theme: &TableTheme, wml: &Wml) {
    if let Some(p_pr) = paragraph.elements_mut().find(|e| is_wml(e, "pPr")) {
        p_pr.remove_children(WML_NS, &["jc"]);
    }
    if theme.header_center {
        let p_pr = paragraph.child_or_insert_with(WML_NS, "pPr", || wml.el("pPr"), Element::prepend);
        p_pr.insert_ordered(wml.val("jc", "center"), PPR_ORDER);
    }
}

fn style_cell_run(run: &mut Element, role: RowRole, theme: &TableTheme, wml: &Wml) {
    let size = theme.font_size.to_string();
    let r_pr = run.child_or_insert_with(WML_NS, "rPr", || wml.el("rPr"), Element::prepend);
    r_pr.remove_children(WML_NS, &["sz", "szCs"]);
    r_pr.insert_ordered(wml.val("sz", &size), RPR_ORDER);
    r_pr.insert_ordered(wml.val("szCs", &size), RPR_ORDER);

    if role != RowRole::Header {
        return;
    }
    r_pr.remove_children(WML_NS, &["color", "b", "bCs"]);
    r_pr.insert_ordered(wml.val("color", &theme.header_text_color), RPR_ORDER);
    if theme.header_bold {
        r_pr.insert_ordered(wml.el("b"), RPR_ORDER);
        r_pr.insert_ordered(wml.el("bCs"), RPR_ORDER);
    }
}

/// Collects `name` children, looking through content-control and custom XML wrappers.
fn collect_through_wrappers<'a>(parent: &'a mut Element, name: &str, out: &mut Vec<&'a mut Element>) {
    for child in parent.elements_mut() {
        if is_wml(child, name) {
            out.push(child);
        } else if is_wml(child, "sdt") || is_wml(child, "sdtContent") || is_wml(child, "customXml") {
            collect_through_wrappers(child, name, out);
        }
    }
}

/// Collects `name` descendants of a cell without entering nested tables.
fn collect_in_cell<'a>(parent: &'a mut Element, name: &str, out: &mut Vec<&'a mut Element>) {
    for child in parent.elements_mut() {
        if is_wml(child, "tbl") {
            continue;
        }
        if is_wml(child, name) {
            out.push(child);
        } else {
            collect_in_cell(child, name, out);
        }
    }
}
