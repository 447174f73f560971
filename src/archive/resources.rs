//! Default-configuration resource values
//!
//! Values come from decoded `res/values/*.xml` files. Ids declared in
//! `public.xml` are honored; everything else gets an id allocated in the
//! application package space (`0x7f`) by type and declaration order.

use crate::document::{Token, XmlDocument};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;

static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[@?]\+?(?:(?P<pkg>[\w.]+):)?(?P<type>[\w-]+)/(?P<name>[\w.]+)$").unwrap()
});

const APP_PACKAGE_ID: u32 = 0x7f;

/// A resolved resource value
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceValue {
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceValue::String(s) => write!(f, "{}", s),
            ResourceValue::Int(i) => write!(f, "{}", i),
            ResourceValue::Float(v) => write!(f, "{}", v),
            ResourceValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResourceTable {
    ids: HashMap<(String, String), u32>,
    values: HashMap<u32, ResourceValue>,
    types: Vec<String>,
    next_entry: HashMap<String, u32>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Record a fixed id, as `public.xml` does
    pub fn declare(&mut self, ty: &str, name: &str, id: u32) {
        self.ids.insert((ty.to_string(), name.to_string()), id);
    }

    /// Define a value, allocating an id if none was declared
    pub fn define(&mut self, ty: &str, name: &str, value: ResourceValue) -> u32 {
        let id = match self.id_of(ty, name) {
            Some(id) => id,
            None => {
                let id = self.allocate(ty);
                self.declare(ty, name, id);
                id
            }
        };
        self.values.insert(id, value);
        id
    }

    fn allocate(&mut self, ty: &str) -> u32 {
        let type_index = match self.types.iter().position(|t| t == ty) {
            Some(i) => i,
            None => {
                self.types.push(ty.to_string());
                self.types.len() - 1
            }
        };
        let entry = self.next_entry.entry(ty.to_string()).or_insert(0);
        let id = (APP_PACKAGE_ID << 24) | (((type_index as u32) + 1) << 16) | *entry;
        *entry += 1;
        id
    }

    pub fn id_of(&self, ty: &str, name: &str) -> Option<u32> {
        self.ids.get(&(ty.to_string(), name.to_string())).copied()
    }

    pub fn value(&self, id: u32) -> Option<&ResourceValue> {
        self.values.get(&id)
    }

    /// Resolve a reference string to an id
    ///
    /// Framework references (`@android:...`) have no entries here and
    /// resolve to `None`.
    pub fn resolve(&self, reference: &str) -> Option<u32> {
        let reference = reference.trim();
        if let Some(hex) = reference
            .strip_prefix("@0x")
            .or_else(|| reference.strip_prefix("@0X"))
        {
            return u32::from_str_radix(hex, 16).ok();
        }
        let caps = REFERENCE.captures(reference)?;
        if caps.name("pkg").map(|p| p.as_str()) == Some("android") {
            return None;
        }
        self.id_of(&caps["type"], &caps["name"])
    }

    /// Load one decoded values file (`<resources>` root)
    pub fn load_values(&mut self, doc: &XmlDocument) {
        let mut cursor = doc.cursor();
        if cursor.next_start_tag() != Token::StartTag || cursor.name() != "resources" {
            return;
        }

        loop {
            match cursor.next() {
                Token::EndDocument => break,
                Token::StartTag if cursor.depth() == 2 => {
                    let tag = cursor.name();
                    let attrs = cursor.attributes();
                    let attr = |key: &str| {
                        attrs
                            .iter()
                            .find(|a| a.namespace.is_none() && a.name == key)
                            .map(|a| a.value.as_str())
                    };
                    let Some(name) = attr("name") else {
                        continue;
                    };

                    if tag == "public" {
                        let id = attr("id")
                            .and_then(|v| v.strip_prefix("0x"))
                            .and_then(|hex| u32::from_str_radix(hex, 16).ok());
                        if let (Some(ty), Some(id)) = (attr("type"), id) {
                            self.declare(ty, name, id);
                        }
                        continue;
                    }

                    let ty = if tag == "item" {
                        match attr("type") {
                            Some(ty) => ty,
                            None => continue,
                        }
                    } else {
                        tag
                    };
                    let format = attr("format");
                    let text = match cursor.next() {
                        Token::Text => cursor.text().unwrap_or_default(),
                        _ => "",
                    };
                    if let Some(value) = typed_value(ty, format, text) {
                        self.define(ty, name, value);
                    }
                }
                _ => {}
            }
        }
    }
}

fn typed_value(ty: &str, format: Option<&str>, text: &str) -> Option<ResourceValue> {
    let text = text.trim();
    match (ty, format) {
        ("bool", _) => match text {
            "true" => Some(ResourceValue::Bool(true)),
            "false" => Some(ResourceValue::Bool(false)),
            _ => None,
        },
        ("integer", _) => text.parse().ok().map(ResourceValue::Int),
        (_, Some("float")) | ("fraction", _) => text.parse().ok().map(ResourceValue::Float),
        ("string" | "plurals" | "string-array", _) => Some(ResourceValue::String(unquote(text))),
        ("dimen", _) => Some(
            text.parse()
                .map(ResourceValue::Float)
                .unwrap_or_else(|_| ResourceValue::String(text.to_string())),
        ),
        _ => Some(ResourceValue::String(text.to_string())),
    }
}

fn unquote(text: &str) -> String {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .replace("\\'", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_ids_are_kept() {
        let mut table = ResourceTable::new();
        let public = XmlDocument::parse(
            r#"<resources><public type="string" name="app_name" id="0x7f0b0001"/></resources>"#,
        )
        .unwrap();
        let strings = XmlDocument::parse(
            r#"<resources>
                <string name="app_name">"Example"</string>
                <bool name="backup">false</bool>
                <item type="dimen" name="ratio" format="float">2.4</item>
            </resources>"#,
        )
        .unwrap();
        table.load_values(&public);
        table.load_values(&strings);

        assert_eq!(table.resolve("@string/app_name"), Some(0x7f0b0001));
        assert_eq!(
            table.value(0x7f0b0001),
            Some(&ResourceValue::String("Example".into()))
        );
        let backup = table.resolve("@bool/backup").unwrap();
        assert_eq!(table.value(backup), Some(&ResourceValue::Bool(false)));
        let ratio = table.resolve("@dimen/ratio").unwrap();
        assert_eq!(table.value(ratio), Some(&ResourceValue::Float(2.4)));
    }

    #[test]
    fn test_allocated_ids_are_distinct_per_type() {
        let mut table = ResourceTable::new();
        let a = table.define("string", "a", ResourceValue::String("a".into()));
        let b = table.define("string", "b", ResourceValue::String("b".into()));
        let c = table.define("bool", "a", ResourceValue::Bool(true));
        assert_eq!(a >> 24, 0x7f);
        assert_ne!(a, b);
        assert_ne!(a & 0x00ff_0000, c & 0x00ff_0000);
    }

    #[test]
    fn test_resolve_forms() {
        let table = ResourceTable::new();
        assert_eq!(table.resolve("@0x7f010002"), Some(0x7f010002));
        assert_eq!(table.resolve("@android:style/Theme"), None);
        assert_eq!(table.resolve("not a reference"), None);
    }
}
