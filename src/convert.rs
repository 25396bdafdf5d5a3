//! Markdown-to-themed-DOCX conversion, minus the HTTP plumbing.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::{Value, json};

use crate::error::Error;
use crate::theme::{Theme, default_theme, schema_json};
use crate::transform::{ThemeReport, apply_theme_with_report};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Characters left alone in RFC 5987 `filename*` values.
const FILENAME_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~');

/// Produces the baseline DOCX for a markdown document.
pub trait DocxGenerator {
    fn generate(&self, markdown: &str, theme: &Theme) -> Result<Vec<u8>, Error>;
}

impl<F> DocxGenerator for F
where
    F: Fn(&str, &Theme) -> Result<Vec<u8>, Error>,
{
    fn generate(&self, markdown: &str, theme: &Theme) -> Result<Vec<u8>, Error> {
        self(markdown, theme)
    }
}

pub struct ConvertedDocx {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub report: ThemeReport,
}

impl ConvertedDocx {
    pub fn content_type(&self) -> &'static str {
        DOCX_CONTENT_TYPE
    }

    pub fn content_disposition(&self) -> String {
        format!(
            "attachment; filename*=UTF-8''{}",
            utf8_percent_encode(&self.filename, FILENAME_SAFE)
        )
    }
}

/// `{ "config": <schema>, "defaults": <default theme> }` for the theme editor.
pub fn schema_document() -> Value {
    json!({
        "config": schema_json(),
        "defaults": default_theme(),
    })
}

/// Converts an uploaded markdown file to a themed DOCX.
///
/// `theme_json` is the request's theme string; when it is absent or unusable the
/// default theme applies. Errors carry the status a front end should answer
/// with via [`Error::status_code`].
pub fn convert_markdown<G: DocxGenerator + ?Sized>(
    generator: &G,
    upload: Option<&[u8]>,
    filename: &str,
    theme_json: Option<&str>,
) -> Result<ConvertedDocx, Error> {
    let upload = upload.ok_or_else(|| Error::BadRequest("No file uploaded.".into()))?;
    let markdown = String::from_utf8_lossy(upload);
    if markdown.is_empty() {
        return Err(Error::BadRequest("Markdown content is empty.".into()));
    }

    let theme = theme_json.map(Theme::from_json_str).unwrap_or_default();

    let baseline = generator.generate(&markdown, &theme).map_err(|e| match e {
        Error::Generation(_) => e,
        other => Error::Generation(other.to_string()),
    })?;
    let (bytes, report) = apply_theme_with_report(&baseline, &theme)?;

    log::info!(
        "Converted {filename}: {} bytes markdown -> {} bytes DOCX",
        upload.len(),
        bytes.len()
    );
    Ok(ConvertedDocx {
        bytes,
        filename: filename.to_string(),
        report,
    })
}
