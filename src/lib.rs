mod convert;
mod docx;
mod error;
mod theme;
mod transform;

pub use convert::{
    ConvertedDocx, DOCX_CONTENT_TYPE, DocxGenerator, convert_markdown, schema_document,
};
pub use docx::{DOCUMENT_PART, DocxPackage, STYLES_PART};
pub use error::Error;
pub use theme::{
    Category, DEFAULT_BODY_BACKGROUND, FieldKind, FieldSpec, FontTheme, SCHEMA,
    TableTheme, Theme, ThemeValue, default_theme, field, normalize_color, schema_json,
    validate_theme,
};
pub use transform::{
    StageOutcome, TableReport, ThemeReport, apply_default_fonts_xml, apply_theme,
    apply_theme_with_report, emoji_segments, is_emoji, split_emoji_runs_xml, style_tables_xml,
};

use std::path::Path;
use std::time::Instant;

pub fn apply_theme_to_file(input: &Path, output: &Path, theme: &Theme) -> Result<ThemeReport, Error> {
    let t0 = Instant::now();

    let baseline = std::fs::read(input).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
            std::io::Error::new(e.kind(), format!("{}: {}", e, input.display())),
        ),
        _ => Error::Io(e),
    })?;
    let t_read = t0.elapsed();

    let (bytes, report) = apply_theme_with_report(&baseline, theme)?;
    let t_theme = t0.elapsed();

    std::fs::write(output, &bytes).map_err(Error::Io)?;
    let t_total = t0.elapsed();

    log::info!(
        "Timing: read={:.1}ms, theme={:.1}ms, write={:.1}ms, total={:.1}ms (output {} bytes)",
        t_read.as_secs_f64() * 1000.0,
        (t_theme - t_read).as_secs_f64() * 1000.0,
        (t_total - t_theme).as_secs_f64() * 1000.0,
        t_total.as_secs_f64() * 1000.0,
        bytes.len(),
    );

    Ok(report)
}
