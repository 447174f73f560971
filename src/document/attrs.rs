use super::{Attribute, XmlCursor};
use crate::archive::{ResourceArchive, ResourceValue};

/// Attribute value with its inferred type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// `@null` or an empty value
    Null,
    String(String),
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Resource reference; 0 when the archive could not resolve it
    Reference(u32),
}

impl TypedValue {
    /// Infer the type of a raw attribute value
    pub fn infer(raw: &str, resources: &dyn ResourceArchive) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == "@null" {
            return TypedValue::Null;
        }
        if trimmed.starts_with('@') || trimmed.starts_with('?') {
            return TypedValue::Reference(resources.resolve_reference(trimmed).unwrap_or(0));
        }
        if trimmed.eq_ignore_ascii_case("true") {
            return TypedValue::Bool(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return TypedValue::Bool(false);
        }
        if let Some(v) = parse_int(trimmed) {
            return TypedValue::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f32>() {
            return TypedValue::Float(v);
        }
        TypedValue::String(raw.to_string())
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, TypedValue::Reference(_))
    }
}

fn parse_int(s: &str) -> Option<i32> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let value = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        // Hex literals are raw 32-bit patterns
        u32::from_str_radix(hex, 16).ok()? as i64
    } else {
        digits.parse::<i64>().ok()?
    };
    let value = if negative { -value } else { value };
    if value > u32::MAX as i64 || value < i32::MIN as i64 {
        return None;
    }
    Some(value as i32)
}

/// Typed, resource-aware view over the attributes of one start tag
///
/// Platform attributes live in the `android` namespace; `unqualified` reads
/// the few attributes that carry no namespace (`package`, `split`, ...).
#[derive(Clone, Copy)]
pub struct Attrs<'a> {
    attributes: &'a [Attribute],
    resources: &'a dyn ResourceArchive,
}

impl<'a> Attrs<'a> {
    pub fn new(attributes: &'a [Attribute], resources: &'a dyn ResourceArchive) -> Self {
        Self {
            attributes,
            resources,
        }
    }

    pub fn of(cursor: &XmlCursor<'a>, resources: &'a dyn ResourceArchive) -> Self {
        Self::new(cursor.attributes(), resources)
    }

    pub fn all(&self) -> &'a [Attribute] {
        self.attributes
    }

    /// Raw value of an `android:` attribute
    pub fn raw(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|a| a.is_android() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Raw value of an attribute without namespace
    pub fn unqualified(&self, name: &str) -> Option<&'a str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Attribute present at all, even with an empty value
    pub fn has_value_or_empty(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    /// Attribute present with a non-null value
    pub fn has_value(&self, name: &str) -> bool {
        !matches!(self.peek(name), None | Some(TypedValue::Null))
    }

    pub fn peek(&self, name: &str) -> Option<TypedValue> {
        self.raw(name).map(|raw| TypedValue::infer(raw, self.resources))
    }

    fn resolved(&self, name: &str) -> Option<ResolvedValue> {
        let raw = self.raw(name)?;
        match TypedValue::infer(raw, self.resources) {
            TypedValue::Null => None,
            TypedValue::Reference(id) => self.resources.value(id).map(ResolvedValue::Resource),
            _ => Some(ResolvedValue::Literal(raw)),
        }
    }

    /// String value, following resource references
    pub fn string(&self, name: &str) -> Option<String> {
        match self.resolved(name)? {
            ResolvedValue::Literal(raw) => Some(raw.to_string()),
            ResolvedValue::Resource(value) => Some(value.to_string()),
        }
    }

    /// String value resolved for the default configuration
    pub fn non_config_string(&self, name: &str) -> Option<String> {
        self.string(name)
    }

    /// Literal string value; references are not followed and read as absent
    pub fn non_resource_string(&self, name: &str) -> Option<&'a str> {
        let raw = self.raw(name)?;
        if raw.starts_with('@') || raw.starts_with('?') {
            None
        } else {
            Some(raw)
        }
    }

    pub fn bool(&self, name: &str, default: bool) -> bool {
        match self.resolved(name) {
            Some(ResolvedValue::Literal(raw)) => match TypedValue::infer(raw, self.resources) {
                TypedValue::Bool(b) => b,
                TypedValue::Int(i) => i != 0,
                _ => default,
            },
            Some(ResolvedValue::Resource(ResourceValue::Bool(b))) => *b,
            Some(ResolvedValue::Resource(ResourceValue::Int(i))) => *i != 0,
            _ => default,
        }
    }

    pub fn int(&self, name: &str, default: i32) -> i32 {
        match self.resolved(name) {
            Some(ResolvedValue::Literal(raw)) => parse_int(raw.trim()).unwrap_or(default),
            Some(ResolvedValue::Resource(ResourceValue::Int(i))) => *i,
            _ => default,
        }
    }

    pub fn float(&self, name: &str, default: f32) -> f32 {
        match self.resolved(name) {
            Some(ResolvedValue::Literal(raw)) => raw.trim().parse().unwrap_or(default),
            Some(ResolvedValue::Resource(ResourceValue::Float(f))) => *f,
            Some(ResolvedValue::Resource(ResourceValue::Int(i))) => *i as f32,
            _ => default,
        }
    }

    /// Resource id of a reference-valued attribute, 0 otherwise
    pub fn resource_id(&self, name: &str) -> u32 {
        match self.peek(name) {
            Some(TypedValue::Reference(id)) => id,
            _ => 0,
        }
    }

    /// Enum attribute written either by symbolic name or as a number
    pub fn enum_int(&self, name: &str, names: &[(&str, i32)], default: i32) -> i32 {
        match self.raw(name) {
            Some(raw) => lookup(names, raw.trim()).unwrap_or_else(|| self.int(name, default)),
            None => default,
        }
    }

    /// Flag attribute written as `a|b|c` names or as a number
    pub fn flags_int(&self, name: &str, names: &[(&str, i32)], default: i32) -> i32 {
        let Some(raw) = self.raw(name) else {
            return default;
        };
        raw.split('|')
            .map(|part| lookup(names, part.trim()))
            .try_fold(0, |acc, value| value.map(|v| acc | v))
            .unwrap_or_else(|| self.int(name, default))
    }
}

fn lookup(names: &[(&str, i32)], key: &str) -> Option<i32> {
    names.iter().find(|(n, _)| *n == key).map(|(_, v)| *v)
}

enum ResolvedValue<'a> {
    Literal(&'a str),
    Resource(&'a ResourceValue),
}
