use std::fmt;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    /// The package bytes are not a readable DOCX/ZIP archive.
    InvalidDocx(String),
    /// A part the caller asked for is not in the package.
    PartMissing(String),
    Xml(roxmltree::Error),
    /// A rewritten part could not be written back out as XML.
    XmlWrite(quick_xml::Error),
    Zip(zip::result::ZipError),
    /// A transformer panicked or produced something it could not finish.
    Transform(String),
    /// The request carried no usable markdown.
    BadRequest(String),
    /// The upstream markdown-to-DOCX generator failed.
    Generation(String),
}

impl Error {
    /// HTTP status a front end should answer with for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::BadRequest(_) => 400,
            _ => 500,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::InvalidDocx(msg) => write!(f, "invalid DOCX: {msg}"),
            Error::PartMissing(name) => write!(f, "package part not found: {name}"),
            Error::Xml(e) => write!(f, "XML error: {e}"),
            Error::XmlWrite(e) => write!(f, "XML write error: {e}"),
            Error::Zip(e) => write!(f, "ZIP error: {e}"),
            Error::Transform(msg) => write!(f, "transform failed: {msg}"),
            Error::BadRequest(msg) => f.write_str(msg),
            Error::Generation(msg) => write!(f, "DOCX generation failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Xml(e) => Some(e),
            Error::XmlWrite(e) => Some(e),
            Error::Zip(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<roxmltree::Error> for Error {
    fn from(e: roxmltree::Error) -> Self {
        Error::Xml(e)
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Error::XmlWrite(e)
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Error::Zip(e)
    }
}
