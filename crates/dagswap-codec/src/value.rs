use std::collections::BTreeMap;

use dagswap_types::Cid;

/// The data model every codec decodes into.
///
/// Maps are ordered by key so that encoding a value is deterministic and two
/// equal values always produce the same bytes (and so the same CID).
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Link(Cid),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Link(_) => "link",
        }
    }

    /// Every link reachable inside this value, depth-first in document order.
    pub fn links(&self) -> Vec<Cid> {
        let mut out = Vec::new();
        self.collect_links(&mut out);
        out
    }

    fn collect_links(&self, out: &mut Vec<Cid>) {
        match self {
            Self::Link(cid) => out.push(cid.clone()),
            Self::List(items) => items.iter().for_each(|v| v.collect_links(out)),
            Self::Map(entries) => entries.values().for_each(|v| v.collect_links(out)),
            _ => {}
        }
    }

    /// Whether any `Link` appears in this value.
    pub fn has_links(&self) -> bool {
        match self {
            Self::Link(_) => true,
            Self::List(items) => items.iter().any(Value::has_links),
            Self::Map(entries) => entries.values().any(Value::has_links),
            _ => false,
        }
    }

    /// Whether any `Bytes` or `Link` appears in this value.
    pub(crate) fn has_binary_or_links(&self) -> bool {
        match self {
            Self::Bytes(_) | Self::Link(_) => true,
            Self::List(items) => items.iter().any(Value::has_binary_or_links),
            Self::Map(entries) => entries.values().any(Value::has_binary_or_links),
            _ => false,
        }
    }

    /// Whether every float in this value is finite.
    pub(crate) fn floats_are_finite(&self) -> bool {
        match self {
            Self::Float(f) => f.is_finite(),
            Self::List(items) => items.iter().all(Value::floats_are_finite),
            Self::Map(entries) => entries.values().all(Value::floats_are_finite),
            _ => true,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_link(&self) -> Option<&Cid> {
        match self {
            Self::Link(cid) => Some(cid),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up `key` if this is a map.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_map().and_then(|m| m.get(key))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Cid> for Value {
    fn from(v: Cid) -> Self {
        Self::Link(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagswap_types::{CodecType, HashAlgorithm};

    fn cid(data: &[u8]) -> Cid {
        Cid::for_data(CodecType::Raw, HashAlgorithm::Sha2_256, data)
    }

    #[test]
    fn links_are_collected_in_document_order() {
        let value: Value = [
            ("a", Value::Link(cid(b"1"))),
            (
                "b",
                Value::List(vec![Value::Link(cid(b"2")), Value::Integer(3)]),
            ),
            ("c", Value::Null),
        ]
        .into_iter()
        .collect();

        assert_eq!(value.links(), vec![cid(b"1"), cid(b"2")]);
        assert!(value.has_links());
    }

    #[test]
    fn scalars_have_no_links() {
        assert!(Value::from("x").links().is_empty());
        assert!(!Value::Bytes(vec![1]).has_links());
        assert!(Value::Bytes(vec![1]).has_binary_or_links());
    }

    #[test]
    fn non_finite_floats_are_detected() {
        let value = Value::List(vec![Value::Float(1.5), Value::Float(f64::NAN)]);
        assert!(!value.floats_are_finite());
        assert!(Value::Float(0.0).floats_are_finite());
    }

    #[test]
    fn map_lookup() {
        let value: Value = [("name", Value::from("x"))].into_iter().collect();
        assert_eq!(value.get("name").and_then(Value::as_str), Some("x"));
        assert!(value.get("missing").is_none());
        assert!(Value::Null.get("name").is_none());
    }
}
