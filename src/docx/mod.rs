pub(crate) mod xml;

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::Error;
use xml::{Element, XML_NS, XmlDocument};

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

pub const DOCUMENT_PART: &str = "word/document.xml";
pub const STYLES_PART: &str = "word/styles.xml";

struct Part {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A DOCX package held in memory as its ordered list of ZIP entries.
///
/// Parts can be read and replaced by name but never added or removed, so the
/// part set after processing is the part set that was loaded.
pub struct DocxPackage {
    parts: Vec<Part>,
}

impl DocxPackage {
    pub fn open(bytes: &[u8]) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| Error::InvalidDocx("file is not a ZIP archive".into()))?;

        let mut parts = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut entry = zip
                .by_index(i)
                .map_err(|e| Error::InvalidDocx(format!("unreadable entry #{i}: {e}")))?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| Error::InvalidDocx(format!("{name}: {e}")))?;
            parts.push(Part {
                compression: entry.compression(),
                is_dir: entry.is_dir(),
                name,
                data,
            });
        }

        log::debug!("Opened package with {} parts", parts.len());
        Ok(DocxPackage { parts })
    }

    pub fn open_path(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
                std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
            ),
            _ => Error::Io(e),
        })?;
        Self::open(&bytes)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    fn find(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name && !p.is_dir)
    }

    pub fn part(&self, name: &str) -> Result<&[u8], Error> {
        self.find(name)
            .map(|p| p.data.as_slice())
            .ok_or_else(|| Error::PartMissing(name.to_string()))
    }

    pub fn part_text(&self, name: &str) -> Result<String, Error> {
        let data = self.part(name)?;
        String::from_utf8(data.to_vec())
            .map_err(|_| Error::InvalidDocx(format!("{name} is not valid UTF-8")))
    }

    /// Replaces the content of an existing part.
    pub fn set_part(&mut self, name: &str, text: String) -> Result<(), Error> {
        let part = self
            .parts
            .iter_mut()
            .find(|p| p.name == name && !p.is_dir)
            .ok_or_else(|| Error::PartMissing(name.to_string()))?;
        part.data = text.into_bytes();
        Ok(())
    }

    /// Replaces several parts at once; nothing is written unless every part exists.
    pub(crate) fn set_parts(&mut self, edits: Vec<(&'static str, String)>) -> Result<(), Error> {
        if let Some((missing, _)) = edits.iter().find(|(name, _)| !self.has_part(name)) {
            return Err(Error::PartMissing(missing.to_string()));
        }
        for (name, text) in edits {
            self.set_part(name, text)?;
        }
        Ok(())
    }

    /// Writes the package back out in load order.
    ///
    /// Stored entries stay stored, everything else is deflated at level 9, and
    /// every entry gets the same fixed timestamp so output is reproducible.
    pub fn serialize(&self) -> Result<Vec<u8>, Error> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let options = entry_options(part.compression);
            if part.is_dir {
                zip.add_directory(part.name.as_str(), options)?;
                continue;
            }
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

fn entry_options(source: CompressionMethod) -> SimpleFileOptions {
    let options = SimpleFileOptions::default().last_modified_time(zip::DateTime::default());
    if source == CompressionMethod::Stored {
        options.compression_method(CompressionMethod::Stored)
    } else {
        options
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(9))
    }
}

pub(crate) fn is_wml(node: &Element, name: &str) -> bool {
    node.is(WML_NS, name)
}

pub(crate) fn wml<'a>(node: &'a Element, name: &str) -> Option<&'a Element> {
    node.child(WML_NS, name)
}

/// Parse a WML boolean toggle element (e.g., w:b, w:tblHeader).
/// Present with no val or val != "0"/"false"/"off" means true.
pub(crate) fn wml_bool(parent: &Element, name: &str) -> Option<bool> {
    wml(parent, name).map(|n| {
        n.attr(Some(WML_NS), "val")
            .is_none_or(|v| v != "0" && v != "false" && v != "off")
    })
}

/// Builds WordprocessingML elements using the prefix the part already binds.
pub(crate) struct Wml {
    /// `None` when WML is the root's default namespace.
    prefix: Option<String>,
    /// Attributes never take the default namespace, so this is always a named prefix.
    attr_prefix: String,
}

impl Wml {
    /// Declares `xmlns:w` (or a free variant) on the root when it has no named
    /// prefix for WML.
    pub(crate) fn for_document(doc: &mut XmlDocument) -> Self {
        let attr_prefix = doc.bind_root_prefix(WML_NS, "w");
        let prefix = if doc.root_default_namespace() == Some(WML_NS) {
            None
        } else {
            Some(attr_prefix.clone())
        };
        Wml {
            prefix,
            attr_prefix,
        }
    }

    pub(crate) fn el(&self, name: &str) -> Element {
        Element::new(self.prefix.as_deref(), Some(WML_NS), name)
    }

    pub(crate) fn el_with(&self, name: &str, attrs: &[(&str, &str)]) -> Element {
        let mut el = self.el(name);
        for (attr, value) in attrs {
            el.set_attr(Some(self.attr_prefix.as_str()), Some(WML_NS), attr, value);
        }
        el
    }

    /// `<w:name w:val="..."/>`
    pub(crate) fn val(&self, name: &str, value: &str) -> Element {
        self.el_with(name, &[("val", value)])
    }
}

pub(crate) fn preserve_space(text_el: &mut Element) {
    text_el.set_attr(Some("xml"), Some(XML_NS), "space", "preserve");
}
