//! DAG-PB: the protobuf node format used by CIDv0.
//!
//! ```text
//! message PBLink { optional bytes Hash = 1; optional string Name = 2; optional uint64 Tsize = 3; }
//! message PBNode { repeated PBLink Links = 2; optional bytes Data = 1; }
//! ```
//!
//! Canonical form writes all `Links` before `Data`, and link fields in
//! field-number order. Decoding is strict: unknown fields, wrong wire types
//! and out-of-order fields are rejected, so a successful decode means the
//! bytes re-encode identically.
//!
//! In the data model a node is a map `{"Data": bytes?, "Links": [link]}` and
//! a link is `{"Hash": link, "Name": string?, "Tsize": integer?}`.

use std::collections::BTreeMap;

use dagswap_types::{varint, Cid, CodecType};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::Codec;

const WIRE_VARINT: u8 = 0;
const WIRE_LEN: u8 = 2;

/// A decoded `PBLink`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PbLink {
    pub hash: Cid,
    pub name: Option<String>,
    pub tsize: Option<u64>,
}

/// A decoded `PBNode`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PbNode {
    pub links: Vec<PbLink>,
    pub data: Option<Vec<u8>>,
}

impl PbNode {
    /// Canonical protobuf encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for link in &self.links {
            let mut inner = Vec::new();
            write_len_field(&mut inner, 1, &link.hash.to_bytes());
            if let Some(name) = &link.name {
                write_len_field(&mut inner, 2, name.as_bytes());
            }
            if let Some(tsize) = link.tsize {
                write_key(&mut inner, 3, WIRE_VARINT);
                varint::encode(tsize, &mut inner);
            }
            write_len_field(&mut out, 2, &inner);
        }
        if let Some(data) = &self.data {
            write_len_field(&mut out, 1, data);
        }
        out
    }

    /// Strict protobuf decoding.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut reader = Reader::new(bytes);
        let mut node = PbNode::default();
        while !reader.is_empty() {
            let (field, wire) = reader.key()?;
            match (field, wire) {
                (2, WIRE_LEN) => {
                    if node.data.is_some() {
                        return Err(pb_err("Links after Data"));
                    }
                    node.links.push(decode_link(reader.len_delimited()?)?);
                }
                (1, WIRE_LEN) => {
                    if node.data.is_some() {
                        return Err(pb_err("duplicate Data"));
                    }
                    node.data = Some(reader.len_delimited()?.to_vec());
                }
                _ => return Err(pb_err(format!("unexpected field {field} wire type {wire}"))),
            }
        }
        Ok(node)
    }

    /// Convert into the data-model form.
    pub fn into_value(self) -> Value {
        let links = self
            .links
            .into_iter()
            .map(|link| {
                let mut map = BTreeMap::new();
                map.insert("Hash".to_owned(), Value::Link(link.hash));
                if let Some(name) = link.name {
                    map.insert("Name".to_owned(), Value::String(name));
                }
                if let Some(tsize) = link.tsize {
                    // Values above i64::MAX are rejected by `decode_link`.
                    map.insert("Tsize".to_owned(), Value::Integer(tsize as i64));
                }
                Value::Map(map)
            })
            .collect();
        let mut map = BTreeMap::new();
        map.insert("Links".to_owned(), Value::List(links));
        if let Some(data) = self.data {
            map.insert("Data".to_owned(), Value::Bytes(data));
        }
        Value::Map(map)
    }

    /// Convert from the data-model form.
    pub fn from_value(value: &Value) -> CodecResult<Self> {
        let map = value.as_map().ok_or_else(|| cannot(format!("a {}", value.kind())))?;
        if let Some(key) = map.keys().find(|k| *k != "Data" && *k != "Links") {
            return Err(cannot(format!("node key {key:?}")));
        }
        let data = match map.get("Data") {
            None => None,
            Some(Value::Bytes(b)) => Some(b.clone()),
            Some(other) => return Err(cannot(format!("Data of kind {}", other.kind()))),
        };
        let links = match map.get("Links") {
            Some(Value::List(items)) => items.iter().map(link_from_value).collect::<CodecResult<_>>()?,
            Some(other) => return Err(cannot(format!("Links of kind {}", other.kind()))),
            None => return Err(cannot("a node without Links")),
        };
        Ok(Self { links, data })
    }
}

fn link_from_value(value: &Value) -> CodecResult<PbLink> {
    let map = value.as_map().ok_or_else(|| cannot(format!("a link of kind {}", value.kind())))?;
    if let Some(key) = map.keys().find(|k| !matches!(k.as_str(), "Hash" | "Name" | "Tsize")) {
        return Err(cannot(format!("link key {key:?}")));
    }
    let hash = map
        .get("Hash")
        .and_then(Value::as_link)
        .cloned()
        .ok_or_else(|| cannot("a link without Hash"))?;
    let name = match map.get("Name") {
        None => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => return Err(cannot(format!("Name of kind {}", other.kind()))),
    };
    let tsize = match map.get("Tsize") {
        None => None,
        Some(Value::Integer(i)) if *i >= 0 => Some(*i as u64),
        Some(_) => return Err(cannot("a negative or non-integer Tsize")),
    };
    Ok(PbLink { hash, name, tsize })
}

fn decode_link(bytes: &[u8]) -> CodecResult<PbLink> {
    let mut reader = Reader::new(bytes);
    let mut last_field = 0;
    let mut hash = None;
    let mut name = None;
    let mut tsize = None;
    while !reader.is_empty() {
        let (field, wire) = reader.key()?;
        if field <= last_field {
            return Err(pb_err("link fields out of order"));
        }
        last_field = field;
        match (field, wire) {
            (1, WIRE_LEN) => {
                let cid = Cid::from_bytes(reader.len_delimited()?).map_err(pb_err)?;
                hash = Some(cid);
            }
            (2, WIRE_LEN) => {
                let text = std::str::from_utf8(reader.len_delimited()?).map_err(pb_err)?;
                name = Some(text.to_owned());
            }
            (3, WIRE_VARINT) => {
                tsize = Some(reader.varint()?);
            }
            _ => return Err(pb_err(format!("unexpected link field {field} wire type {wire}"))),
        }
    }
    let hash = hash.ok_or_else(|| pb_err("link without Hash"))?;
    Ok(PbLink { hash, name, tsize })
}

fn pb_err(reason: impl ToString) -> CodecError {
    CodecError::decode(CodecType::DagPb, reason)
}

fn cannot(reason: impl ToString) -> CodecError {
    CodecError::cannot_encode(CodecType::DagPb, reason)
}

// ---------------------------------------------------------------------------
// Protobuf primitives
// ---------------------------------------------------------------------------

// Every value dag-pb carries fits in 63 bits, so the multiformats varint
// doubles as the protobuf one.

fn write_key(out: &mut Vec<u8>, field: u64, wire: u8) {
    varint::encode((field << 3) | u64::from(wire), out);
}

fn write_len_field(out: &mut Vec<u8>, field: u64, bytes: &[u8]) {
    write_key(out, field, WIRE_LEN);
    varint::encode(bytes.len() as u64, out);
    out.extend_from_slice(bytes);
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn varint(&mut self) -> CodecResult<u64> {
        let (value, used) = varint::decode(self.buf)
            .ok_or_else(|| pb_err("malformed varint"))?;
        self.buf = &self.buf[used..];
        Ok(value)
    }

    fn key(&mut self) -> CodecResult<(u64, u8)> {
        let key = self.varint()?;
        Ok((key >> 3, (key & 0x07) as u8))
    }

    fn len_delimited(&mut self) -> CodecResult<&'a [u8]> {
        let len = usize::try_from(self.varint()?).map_err(|_| pb_err("length overflow"))?;
        if len > self.buf.len() {
            return Err(pb_err("truncated field"));
        }
        let (field, rest) = self.buf.split_at(len);
        self.buf = rest;
        Ok(field)
    }
}

/// DAG-PB codec over the [`PbNode`] form.
#[derive(Clone, Copy, Debug, Default)]
pub struct DagPbCodec;

impl Codec for DagPbCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::DagPb
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        Ok(PbNode::from_value(value)?.encode())
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        Ok(PbNode::decode(bytes)?.into_value())
    }

    fn can_encode(&self, value: &Value) -> bool {
        PbNode::from_value(value).is_ok()
    }

    fn extract_links(&self, bytes: &[u8]) -> CodecResult<Vec<Cid>> {
        Ok(PbNode::decode(bytes)?.links.into_iter().map(|l| l.hash).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagswap_types::HashAlgorithm;

    fn cid(data: &[u8]) -> Cid {
        Cid::for_data(CodecType::Raw, HashAlgorithm::Sha2_256, data)
    }

    fn sample_node() -> PbNode {
        PbNode {
            links: vec![
                PbLink {
                    hash: cid(b"a"),
                    name: Some("a.txt".into()),
                    tsize: Some(1),
                },
                PbLink {
                    hash: cid(b"b"),
                    name: None,
                    tsize: None,
                },
            ],
            data: Some(b"\x08\x01".to_vec()),
        }
    }

    #[test]
    fn node_roundtrip() {
        let node = sample_node();
        let bytes = node.encode();
        assert_eq!(PbNode::decode(&bytes).unwrap(), node);
    }

    #[test]
    fn empty_node_encodes_to_nothing() {
        assert!(PbNode::default().encode().is_empty());
        assert_eq!(PbNode::decode(&[]).unwrap(), PbNode::default());
    }

    #[test]
    fn value_roundtrip_through_codec() {
        let value = sample_node().into_value();
        let bytes = DagPbCodec.encode(&value).unwrap();
        assert_eq!(DagPbCodec.decode(&bytes).unwrap(), value);
    }

    #[test]
    fn extract_links_returns_hashes_in_order() {
        let bytes = sample_node().encode();
        assert_eq!(DagPbCodec.extract_links(&bytes).unwrap(), vec![cid(b"a"), cid(b"b")]);
    }

    #[test]
    fn data_before_links_is_rejected() {
        let mut bytes = Vec::new();
        write_len_field(&mut bytes, 1, b"data");
        let link = PbNode {
            links: vec![PbLink {
                hash: cid(b"x"),
                name: None,
                tsize: None,
            }],
            data: None,
        };
        bytes.extend(link.encode());
        assert!(PbNode::decode(&bytes).is_err());
    }

    #[test]
    fn arbitrary_text_is_not_dag_pb() {
        assert!(PbNode::decode(b"hello world").is_err());
        assert!(PbNode::decode(br#"{"a":1}"#).is_err());
    }

    #[test]
    fn cannot_encode_non_node_values() {
        assert!(!DagPbCodec.can_encode(&Value::from("x")));
        let missing_links: Value = [("Data", Value::Bytes(vec![]))].into_iter().collect();
        assert!(!DagPbCodec.can_encode(&missing_links));
        let extra: Value = [
            ("Links", Value::List(vec![])),
            ("Extra", Value::Null),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            DagPbCodec.encode(&extra),
            Err(CodecError::CannotEncode { .. })
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let bytes = sample_node().encode();
        assert!(PbNode::decode(&bytes[..bytes.len() - 1]).is_err());
    }

    #[test]
    fn malformed_varints_are_rejected() {
        // Field 1 key spelled with a redundant continuation byte.
        assert!(PbNode::decode(&[0x8a, 0x00, 0x00]).is_err());
        assert!(PbNode::decode(&[0xff; 10]).is_err());
        assert!(PbNode::decode(&[0x80]).is_err());
    }
}
