//! Binary XML documents decoded into element trees.

use crate::chunk::{ChunkHeader, ChunkType};
use crate::errors::{ResourcesError, ResourcesResult};
use crate::parsers::{
    chunk_header_parser, string_pool_parser, xml_cdata_parser, xml_end_element_parser,
    xml_namespace_parser, xml_resource_map_parser, xml_start_element_parser, Chunks,
};
use crate::strings::StringPool;
use crate::values::Value;
use nom::Finish;
use std::fmt;

/// Namespace URI used by Android framework attributes.
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

/// A namespace binding introduced on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlAttribute {
    pub namespace: Option<String>,
    pub name: String,
    /// Framework attribute id found in the document resource map.
    pub resource_id: Option<u32>,
    /// Original textual value, when the compiler kept it.
    pub raw: Option<String>,
    pub value: Value,
}

impl XmlAttribute {
    /// Returns the attribute value as a string, preferring the raw text.
    #[must_use]
    pub fn resolved(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => self.value.to_string(),
        }
    }
}

/// One element of a decoded document, owning its sub-elements.
#[derive(Debug, Clone, PartialEq)]
pub struct XmlNode {
    pub namespace: Option<String>,
    pub name: String,
    pub line: u32,
    pub namespaces: Vec<Namespace>,
    pub attributes: Vec<XmlAttribute>,
    pub text: Option<String>,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
            line: 0,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
        }
    }

    /// Looks an attribute up by framework resource id first, then by name
    /// within `namespace`.
    #[must_use]
    pub fn attribute(&self, namespace: Option<&str>, name: &str, id: Option<u32>) -> Option<&XmlAttribute> {
        if let Some(id) = id {
            if let Some(attr) = self
                .attributes
                .iter()
                .find(|attr| attr.resource_id == Some(id))
            {
                return Some(attr);
            }
        }
        self.attributes
            .iter()
            .find(|attr| attr.name == name && attr.namespace.as_deref() == namespace)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Number of elements in the subtree rooted at this node.
    #[must_use]
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(Self::size).sum::<usize>()
    }
}

/// The outcome of decoding a binary XML document.
///
/// Decoding stops at the first malformed chunk; whatever was decoded up to
/// that point is kept in `root`, still-open elements being closed.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialXml {
    pub root: Option<XmlNode>,
    pub error: Option<ResourcesError>,
}

impl PartialXml {
    /// Converts into a strict result, failing on any decoding error.
    pub fn into_result(self) -> ResourcesResult<XmlNode> {
        match (self.root, self.error) {
            (_, Some(err)) => Err(err),
            (Some(root), None) => Ok(root),
            (None, None) => Err(ResourcesError::MalformedBinaryXml {
                offset: 0,
                reason: "document has no root element".to_string(),
            }),
        }
    }
}

/// Decodes a binary XML document, keeping the partial tree on failure.
#[must_use]
pub fn decode(input: &[u8]) -> PartialXml {
    let mut builder = TreeBuilder::default();
    let error = builder.run(input).err();
    if let Some(err) = &error {
        log::warn!("{}", err);
    }
    PartialXml {
        root: builder.finish(),
        error,
    }
}

/// Decodes a binary XML document, failing on any malformed chunk.
pub fn parse(input: &[u8]) -> ResourcesResult<XmlNode> {
    decode(input).into_result()
}

fn malformed(offset: usize, err: ResourcesError) -> ResourcesError {
    match err {
        ResourcesError::MalformedBinaryXml { .. } => err,
        other => ResourcesError::MalformedBinaryXml {
            offset,
            reason: other.to_string(),
        },
    }
}

#[derive(Default)]
struct TreeBuilder {
    pool: Option<StringPool>,
    resource_map: Vec<u32>,
    pending_namespaces: Vec<Namespace>,
    stack: Vec<XmlNode>,
    root: Option<XmlNode>,
}

impl TreeBuilder {
    fn run(&mut self, input: &[u8]) -> ResourcesResult<()> {
        log::debug!(">> xml decode");

        let (_, header) = chunk_header_parser(input)
            .finish()
            .map_err(|err| malformed(0, err))?;
        if header.typ != ChunkType::Xml {
            return Err(malformed(
                0,
                ResourcesError::InvalidChunk(format!("document starts with {}", header.typ)),
            ));
        }

        // a document longer than its buffer is decoded as far as possible,
        // the overflow being reported once the available chunks are consumed
        let mut overflow = None;
        let end = if header.chunk_size > input.len() {
            overflow = Some(malformed(
                0,
                ResourcesError::ChunkOverflow {
                    chunk: header.typ,
                    declared: header.chunk_size,
                    available: input.len(),
                },
            ));
            input.len()
        } else {
            header.chunk_size
        };

        for (offset, next) in Chunks::new(&input[..end], header.header_size) {
            let (chunk_header, chunk) = next.map_err(|err| malformed(offset, err))?;
            self.chunk(chunk_header, chunk)
                .map_err(|err| malformed(offset, err))?;
        }

        log::debug!("<< xml decode");

        match overflow {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn pool(&self) -> ResourcesResult<&StringPool> {
        self.pool.as_ref().ok_or_else(|| {
            ResourcesError::InvalidChunk("element found before the string pool".to_string())
        })
    }

    fn chunk(&mut self, header: ChunkHeader, chunk: &[u8]) -> ResourcesResult<()> {
        match header.typ {
            ChunkType::StringPool if self.pool.is_none() => {
                let (_, pool) = string_pool_parser(chunk).finish()?;
                self.pool = Some(pool);
            }
            ChunkType::XmlResourceMap => {
                let (_, ids) = xml_resource_map_parser(chunk).finish()?;
                self.resource_map = ids;
            }
            ChunkType::XmlStartNamespace => {
                let (_, ns) = xml_namespace_parser(chunk, self.pool()?).finish()?;
                self.pending_namespaces.push(ns);
            }
            ChunkType::XmlEndNamespace => (),
            ChunkType::XmlStartElement => {
                let (_, mut node) =
                    xml_start_element_parser(chunk, self.pool()?, &self.resource_map).finish()?;
                node.namespaces = std::mem::take(&mut self.pending_namespaces);
                self.stack.push(node);
            }
            ChunkType::XmlEndElement => {
                let (_, name) = xml_end_element_parser(chunk, self.pool()?).finish()?;
                let node = self.stack.pop().ok_or_else(|| {
                    ResourcesError::InvalidChunk(format!("unbalanced end of <{name}>"))
                })?;
                if node.name != name {
                    log::warn!("<{}> closed by </{}>", node.name, name);
                }
                self.attach(node);
            }
            ChunkType::XmlCdata => {
                let (_, text) = xml_cdata_parser(chunk, self.pool()?).finish()?;
                if let Some(node) = self.stack.last_mut() {
                    node.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            other => log::warn!("skipping unexpected {} chunk", other),
        }
        Ok(())
    }

    fn attach(&mut self, node: XmlNode) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(node);
        } else if self.root.is_none() {
            self.root = Some(node);
        } else {
            log::warn!("ignoring extra top-level element <{}>", node.name);
        }
    }

    fn finish(mut self) -> Option<XmlNode> {
        while let Some(node) = self.stack.pop() {
            self.attach(node);
        }
        self.root
    }
}

fn write_node<'a>(
    f: &mut fmt::Formatter,
    node: &'a XmlNode,
    depth: usize,
    scopes: &mut Vec<&'a Namespace>,
) -> fmt::Result {
    fn prefix<'n>(scopes: &[&'n Namespace], uri: Option<&str>) -> Option<&'n str> {
        let uri = uri?;
        scopes
            .iter()
            .rev()
            .find(|ns| ns.uri == uri)
            .and_then(|ns| ns.prefix.as_deref())
    }

    let mark = scopes.len();
    scopes.extend(node.namespaces.iter());

    let indent = "  ".repeat(depth);
    write!(f, "{indent}<")?;
    if let Some(p) = prefix(scopes, node.namespace.as_deref()) {
        write!(f, "{p}:")?;
    }
    write!(f, "{}", node.name)?;
    for ns in &node.namespaces {
        match &ns.prefix {
            Some(p) => write!(f, " xmlns:{p}=\"{}\"", ns.uri)?,
            None => write!(f, " xmlns=\"{}\"", ns.uri)?,
        }
    }
    for attr in &node.attributes {
        write!(f, " ")?;
        if let Some(p) = prefix(scopes, attr.namespace.as_deref()) {
            write!(f, "{p}:")?;
        }
        let value = attr.resolved();
        write!(
            f,
            "{}=\"{}\"",
            attr.name,
            html_escape::encode_double_quoted_attribute(&value)
        )?;
    }

    if node.children.is_empty() && node.text.is_none() {
        writeln!(f, "/>")?;
    } else {
        writeln!(f, ">")?;
        if let Some(text) = &node.text {
            writeln!(f, "{indent}  {}", html_escape::encode_text(text))?;
        }
        for child in &node.children {
            write_node(f, child, depth + 1, scopes)?;
        }
        write!(f, "{indent}</")?;
        if let Some(p) = prefix(scopes, node.namespace.as_deref()) {
            write!(f, "{p}:")?;
        }
        writeln!(f, "{}>", node.name)?;
    }

    scopes.truncate(mark);
    Ok(())
}

/// Prints the tree back in textual XML form.
impl fmt::Display for XmlNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"no\"?>"
        )?;
        write_node(f, self, 0, &mut Vec::new())
    }
}
