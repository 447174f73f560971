//! Attributed tree documents
//!
//! Manifests are read into a flat list of start/end/text nodes with
//! namespace-resolved attributes. The tree is walked through an
//! [`XmlCursor`], which reports nesting depth the way a pull parser does.

mod attrs;
mod cursor;

pub use attrs::{Attrs, TypedValue};
pub use cursor::{Token, XmlCursor};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Namespace of platform-defined manifest attributes
pub const ANDROID_NS: &str = "http://schemas.android.com/apk/res/android";

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("XML error at line {line}: {message}")]
    Xml { line: usize, message: String },
    #[error("unclosed element <{0}> at end of document")]
    Unclosed(String),
    #[error("document is empty")]
    Empty,
}

/// A single attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Resolved namespace URI, `None` for unqualified attributes
    pub namespace: Option<String>,
    /// Local name
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn is_android(&self) -> bool {
        self.namespace.as_deref() == Some(ANDROID_NS)
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Node {
    Start {
        name: String,
        attributes: Vec<Attribute>,
        line: usize,
    },
    End {
        name: String,
        line: usize,
    },
    Text {
        text: String,
        line: usize,
    },
}

/// A parsed document, read many times through cursors
#[derive(Debug, Clone, Default)]
pub struct XmlDocument {
    nodes: Vec<Node>,
}

impl XmlDocument {
    /// Parse XML text into an attributed tree
    pub fn parse(contents: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(contents);
        reader.trim_text(true);

        let lines = LineIndex::new(contents);
        let mut nodes = Vec::new();
        let mut open: Vec<String> = Vec::new();
        let mut scopes = NamespaceScopes::default();

        loop {
            let event = reader.read_event().map_err(|e| DocumentError::Xml {
                line: lines.line_of(reader.buffer_position()),
                message: e.to_string(),
            })?;
            let line = lines.line_of(reader.buffer_position().saturating_sub(1));

            match event {
                Event::Start(ref e) => {
                    let (name, attributes) = read_start(e, &mut scopes, line)?;
                    open.push(name.clone());
                    nodes.push(Node::Start {
                        name,
                        attributes,
                        line,
                    });
                }
                Event::Empty(ref e) => {
                    let (name, attributes) = read_start(e, &mut scopes, line)?;
                    scopes.pop();
                    nodes.push(Node::Start {
                        name: name.clone(),
                        attributes,
                        line,
                    });
                    nodes.push(Node::End { name, line });
                }
                Event::End(_) => {
                    let name = open.pop().unwrap_or_default();
                    scopes.pop();
                    nodes.push(Node::End { name, line });
                }
                Event::Text(ref t) => {
                    let text = t.unescape().map_err(|e| DocumentError::Xml {
                        line,
                        message: e.to_string(),
                    })?;
                    if !text.trim().is_empty() {
                        nodes.push(Node::Text {
                            text: text.into_owned(),
                            line,
                        });
                    }
                }
                Event::CData(ref t) => {
                    let text = String::from_utf8_lossy(&t[..]).into_owned();
                    nodes.push(Node::Text { text, line });
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(name) = open.pop() {
            return Err(DocumentError::Unclosed(name));
        }
        if nodes.is_empty() {
            return Err(DocumentError::Empty);
        }

        Ok(Self { nodes })
    }

    /// Cursor positioned before the first node
    pub fn cursor(&self) -> XmlCursor<'_> {
        XmlCursor::new(self)
    }

    pub(crate) fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

fn read_start(
    e: &BytesStart,
    scopes: &mut NamespaceScopes,
    line: usize,
) -> Result<(String, Vec<Attribute>), DocumentError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();

    let mut raw = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DocumentError::Xml {
            line,
            message: err.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| DocumentError::Xml {
                line,
                message: err.to_string(),
            })?
            .into_owned();
        raw.push((key, value));
    }

    // Declarations first so attributes on the same tag can use them
    let mut declared = Vec::new();
    for (key, value) in &raw {
        if let Some(prefix) = key.strip_prefix("xmlns:") {
            declared.push((prefix.to_string(), value.clone()));
        }
    }
    scopes.push(declared);

    let attributes = raw
        .into_iter()
        .filter(|(key, _)| key != "xmlns" && !key.starts_with("xmlns:"))
        .map(|(key, value)| match key.split_once(':') {
            Some((prefix, local)) => Attribute {
                namespace: Some(scopes.resolve(prefix)),
                name: local.to_string(),
                value,
            },
            None => Attribute {
                namespace: None,
                name: key,
                value,
            },
        })
        .collect();

    Ok((name, attributes))
}

#[derive(Default)]
struct NamespaceScopes {
    scopes: Vec<Vec<(String, String)>>,
}

impl NamespaceScopes {
    fn push(&mut self, declared: Vec<(String, String)>) {
        self.scopes.push(declared);
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn resolve(&self, prefix: &str) -> String {
        for scope in self.scopes.iter().rev() {
            if let Some((_, uri)) = scope.iter().find(|(p, _)| p == prefix) {
                return uri.clone();
            }
        }
        // Undeclared `android:` is common in hand-written manifests
        if prefix == "android" {
            ANDROID_NS.to_string()
        } else {
            prefix.to_string()
        }
    }
}

/// Byte offset to 1-based line number
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(contents: &str) -> Self {
        Self {
            newlines: contents
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&nl| nl < offset) + 1
    }
}
