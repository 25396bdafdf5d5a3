//! Owned, mutable element tree for package parts.
//!
//! Parts are parsed with roxmltree and copied into `Element`/`Node` values that
//! transformers can edit in place. Serialization writes the declaration back
//! verbatim and re-emits every node through `quick_xml::Writer`, so content the
//! transformers never touch survives unchanged (modulo entity spelling and
//! `<a></a>` becoming `<a/>`).

use quick_xml::Writer;
use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};

use crate::error::Error;

pub(crate) const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Attribute {
    pub(crate) prefix: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) name: String,
    pub(crate) value: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    Element(Element),
    Text(String),
    Comment(String),
    Pi { target: String, value: Option<String> },
}

impl Node {
    pub(crate) fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    pub(crate) fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Element {
    pub(crate) prefix: Option<String>,
    pub(crate) namespace: Option<String>,
    pub(crate) name: String,
    /// Namespace declarations made on this element (not inherited ones).
    pub(crate) namespaces: Vec<(Option<String>, String)>,
    pub(crate) attributes: Vec<Attribute>,
    pub(crate) children: Vec<Node>,
}

impl Element {
    pub(crate) fn new(prefix: Option<&str>, namespace: Option<&str>, name: &str) -> Self {
        Element {
            prefix: prefix.map(str::to_owned),
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Same tag, declarations and attributes, no children.
    pub(crate) fn empty_copy(&self) -> Self {
        Element {
            prefix: self.prefix.clone(),
            namespace: self.namespace.clone(),
            name: self.name.clone(),
            namespaces: self.namespaces.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }

    pub(crate) fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    pub(crate) fn attr(&self, namespace: Option<&str>, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name && a.namespace.as_deref() == namespace)
            .map(|a| a.value.as_str())
    }

    pub(crate) fn set_attr(
        &mut self,
        prefix: Option<&str>,
        namespace: Option<&str>,
        name: &str,
        value: &str,
    ) {
        if let Some(existing) = self
            .attributes
            .iter_mut()
            .find(|a| a.name == name && a.namespace.as_deref() == namespace)
        {
            existing.value = value.to_owned();
            return;
        }
        self.attributes.push(Attribute {
            prefix: prefix.map(str::to_owned),
            namespace: namespace.map(str::to_owned),
            name: name.to_owned(),
            value: value.to_owned(),
        });
    }

    pub(crate) fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(Node::as_element_mut)
    }

    pub(crate) fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(namespace, name))
    }

    fn child_index(&self, namespace: &str, name: &str) -> Option<usize> {
        self.children
            .iter()
            .position(|n| n.as_element().is_some_and(|e| e.is(namespace, name)))
    }

    /// Removes every child element with one of `names` in `namespace`.
    pub(crate) fn remove_children(&mut self, namespace: &str, names: &[&str]) -> usize {
        let before = self.children.len();
        self.children.retain(|n| {
            !n.as_element().is_some_and(|e| {
                e.namespace.as_deref() == Some(namespace) && names.contains(&e.name.as_str())
            })
        });
        before - self.children.len()
    }

    /// Inserts `child` ahead of the first sibling that `order` ranks after it.
    /// Names missing from `order` are appended.
    pub(crate) fn insert_ordered(&mut self, child: Element, order: &[&str]) -> usize {
        let rank = |name: &str| order.iter().position(|o| *o == name);
        let index = match rank(&child.name) {
            Some(own) => self
                .children
                .iter()
                .position(|n| {
                    n.as_element()
                        .filter(|e| e.namespace == child.namespace)
                        .and_then(|e| rank(&e.name))
                        .is_some_and(|r| r > own)
                })
                .unwrap_or(self.children.len()),
            None => self.children.len(),
        };
        self.children.insert(index, Node::Element(child));
        index
    }

    /// Inserts `child` before the first child element.
    pub(crate) fn prepend(&mut self, child: Element) -> usize {
        let index = self
            .children
            .iter()
            .position(|n| n.as_element().is_some())
            .unwrap_or(self.children.len());
        self.children.insert(index, Node::Element(child));
        index
    }

    /// Returns the named child, creating it with `make` and `place` when absent.
    pub(crate) fn child_or_insert_with(
        &mut self,
        namespace: &str,
        name: &str,
        make: impl FnOnce() -> Element,
        place: impl FnOnce(&mut Element, Element) -> usize,
    ) -> &mut Element {
        let index = match self.child_index(namespace, name) {
            Some(i) => i,
            None => place(self, make()),
        };
        let Node::Element(child) = &mut self.children[index] else {
            unreachable!("child index always points at an element");
        };
        child
    }

    /// Text of the direct text nodes of this element.
    pub(crate) fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    fn qname(&self) -> String {
        qualified(self.prefix.as_deref(), &self.name)
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), quick_xml::Error> {
        let name = self.qname();
        let mut start = BytesStart::new(name.as_str());
        for (prefix, uri) in &self.namespaces {
            let key = qualified(Some("xmlns"), prefix.as_deref().unwrap_or(""));
            push_attribute(&mut start, &key, uri);
        }
        for attr in &self.attributes {
            let key = qualified(attr.prefix.as_deref(), &attr.name);
            push_attribute(&mut start, &key, &attr.value);
        }
        if self.children.is_empty() {
            return writer.write_event(Event::Empty(start));
        }
        writer.write_event(Event::Start(start))?;
        for child in &self.children {
            child.write_to(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(name.as_str())))
    }
}

impl Node {
    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<(), quick_xml::Error> {
        match self {
            Node::Element(e) => e.write_to(writer),
            Node::Text(t) => {
                writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(t))))
            }
            Node::Comment(c) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(c.as_str())))
            }
            Node::Pi { target, value } => {
                let content = match value {
                    Some(v) => format!("{target} {v}"),
                    None => target.clone(),
                };
                writer.write_event(Event::PI(BytesText::from_escaped(content)))
            }
        }
    }
}

/// A parsed XML part.
#[derive(Clone, Debug)]
pub(crate) struct XmlDocument {
    /// BOM, XML declaration and the whitespace after it, exactly as read.
    head: String,
    prolog: Vec<Node>,
    pub(crate) root: Element,
    epilog: Vec<Node>,
}

impl XmlDocument {
    pub(crate) fn parse(text: &str) -> Result<Self, Error> {
        let head = declaration_head(text);
        let doc = roxmltree::Document::parse(&text[head.len()..])?;

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;
        for child in doc.root().children() {
            if child.is_element() {
                root = Some(convert_element(child));
                continue;
            }
            let Some(node) = convert_node(child) else {
                continue;
            };
            if root.is_none() {
                prolog.push(node);
            } else {
                epilog.push(node);
            }
        }
        let root = root.ok_or_else(|| Error::Transform("XML part has no root element".into()))?;

        Ok(XmlDocument {
            head: head.to_owned(),
            prolog,
            root,
            epilog,
        })
    }

    pub(crate) fn to_xml(&self) -> Result<String, Error> {
        let mut writer = Writer::new(Vec::with_capacity(self.head.len() + 4096));
        writer.get_mut().extend_from_slice(self.head.as_bytes());
        for node in &self.prolog {
            node.write_to(&mut writer)?;
        }
        self.root.write_to(&mut writer)?;
        for node in &self.epilog {
            node.write_to(&mut writer)?;
        }
        String::from_utf8(writer.into_inner())
            .map_err(|e| Error::Transform(format!("serialized XML is not UTF-8: {e}")))
    }

    /// Namespace the root declares as its default, if any.
    pub(crate) fn root_default_namespace(&self) -> Option<&str> {
        self.root
            .namespaces
            .iter()
            .find(|(prefix, _)| prefix.is_none())
            .map(|(_, uri)| uri.as_str())
    }

    /// A named prefix the root binds to `namespace`. When there is none, one is
    /// declared on the root: `preferred`, or `preferred` plus a number if that
    /// prefix is already taken.
    pub(crate) fn bind_root_prefix(&mut self, namespace: &str, preferred: &str) -> String {
        if let Some(prefix) = self
            .root
            .namespaces
            .iter()
            .find(|(prefix, uri)| prefix.is_some() && uri == namespace)
            .and_then(|(prefix, _)| prefix.clone())
        {
            return prefix;
        }
        let taken = |candidate: &str| {
            self.root
                .namespaces
                .iter()
                .any(|(prefix, _)| prefix.as_deref() == Some(candidate))
        };
        let mut prefix = preferred.to_owned();
        let mut n = 0;
        while taken(&prefix) {
            n += 1;
            prefix = format!("{preferred}{n}");
        }
        self.root
            .namespaces
            .push((Some(prefix.clone()), namespace.to_owned()));
        prefix
    }
}

/// Leading BOM plus `<?xml ...?>` and trailing whitespace, if present.
fn declaration_head(text: &str) -> &str {
    let bom = if text.starts_with('\u{feff}') { '\u{feff}'.len_utf8() } else { 0 };
    let rest = &text[bom..];
    if !rest.starts_with("<?xml") {
        return &text[..bom];
    }
    let Some(end) = rest.find("?>") else {
        return &text[..bom];
    };
    let after = end + 2;
    let ws = rest[after..]
        .find(|c: char| !c.is_ascii_whitespace())
        .unwrap_or(rest.len() - after);
    &text[..bom + after + ws]
}

fn prefix_for(node: roxmltree::Node, namespace: &str) -> Option<String> {
    if namespace == XML_NS {
        return Some("xml".to_owned());
    }
    node.lookup_prefix(namespace)
        .filter(|p| !p.is_empty())
        .map(str::to_owned)
}

/// Attributes cannot use the default namespace, so only named prefixes count.
fn attribute_prefix_for(node: roxmltree::Node, namespace: &str) -> Option<String> {
    if namespace == XML_NS {
        return Some("xml".to_owned());
    }
    node.namespaces()
        .find(|ns| ns.uri() == namespace && ns.name().is_some())
        .and_then(|ns| ns.name())
        .map(str::to_owned)
}

fn convert_element(node: roxmltree::Node) -> Element {
    let tag = node.tag_name();
    let namespace = tag.namespace();
    let prefix = namespace.and_then(|ns| prefix_for(node, ns));

    let inherited: Vec<(Option<&str>, &str)> = node
        .parent_element()
        .map(|p| p.namespaces().map(|ns| (ns.name(), ns.uri())).collect())
        .unwrap_or_default();
    let namespaces = node
        .namespaces()
        .filter(|ns| ns.uri() != XML_NS && !inherited.contains(&(ns.name(), ns.uri())))
        .map(|ns| (ns.name().map(str::to_owned), ns.uri().to_owned()))
        .collect();

    let attributes = node
        .attributes()
        .map(|a| Attribute {
            prefix: a.namespace().and_then(|ns| attribute_prefix_for(node, ns)),
            namespace: a.namespace().map(str::to_owned),
            name: a.name().to_owned(),
            value: a.value().to_owned(),
        })
        .collect();

    let children = node.children().filter_map(convert_node).collect();

    Element {
        prefix,
        namespace: namespace.map(str::to_owned),
        name: tag.name().to_owned(),
        namespaces,
        attributes,
        children,
    }
}

fn convert_node(node: roxmltree::Node) -> Option<Node> {
    match node.node_type() {
        roxmltree::NodeType::Element => Some(Node::Element(convert_element(node))),
        roxmltree::NodeType::Text => node.text().map(|t| Node::Text(t.to_owned())),
        roxmltree::NodeType::Comment => node.text().map(|t| Node::Comment(t.to_owned())),
        roxmltree::NodeType::PI => node.pi().map(|pi| Node::Pi {
            target: pi.target.to_owned(),
            value: pi.value.map(str::to_owned),
        }),
        roxmltree::NodeType::Root => None,
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) if name.is_empty() => prefix.to_owned(),
        Some(prefix) => format!("{prefix}:{name}"),
        None => name.to_owned(),
    }
}

/// Pushes an already-escaped attribute; whitespace that attribute-value
/// normalization would flatten is written as character references.
fn push_attribute(start: &mut BytesStart, key: &str, value: &str) {
    let escaped = escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;");
    start.push_attribute((key.as_bytes(), escaped.as_bytes()));
}
