use std::collections::BTreeMap;

use dagswap_types::{Cid, CodecType};
use serde_json::{Map, Number, Value as Json};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::Codec;

/// Plain JSON. Bytes and links have no representation and are rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::Json
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        if !self.can_encode(value) {
            return Err(CodecError::cannot_encode(
                CodecType::Json,
                "bytes, links or non-finite floats",
            ));
        }
        let json = to_json(value, CodecType::Json, &|_| None)?;
        serde_json::to_vec(&json).map_err(|e| CodecError::Encode {
            codec: CodecType::Json,
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        let json: Json =
            serde_json::from_slice(bytes).map_err(|e| CodecError::decode(CodecType::Json, e))?;
        from_json(json, CodecType::Json, &|_| Ok(None))
    }

    fn can_encode(&self, value: &Value) -> bool {
        !value.has_binary_or_links() && value.floats_are_finite()
    }

    fn extract_links(&self, _bytes: &[u8]) -> CodecResult<Vec<Cid>> {
        Ok(Vec::new())
    }
}

/// Hook for representing `Bytes`/`Link` as JSON. Returns `None` if the value
/// is not special.
pub(crate) type EncodeSpecial<'a> = dyn Fn(&Value) -> Option<Json> + 'a;

/// Hook for recognising special JSON objects while decoding.
pub(crate) type DecodeSpecial<'a> = dyn Fn(&Map<String, Json>) -> CodecResult<Option<Value>> + 'a;

pub(crate) fn to_json(value: &Value, codec: CodecType, special: &EncodeSpecial<'_>) -> CodecResult<Json> {
    if let Some(json) = special(value) {
        return Ok(json);
    }
    Ok(match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Integer(i) => Json::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(Json::Number)
            .ok_or_else(|| CodecError::cannot_encode(codec, "non-finite float"))?,
        Value::String(s) => Json::String(s.clone()),
        Value::List(items) => Json::Array(
            items
                .iter()
                .map(|v| to_json(v, codec, special))
                .collect::<CodecResult<_>>()?,
        ),
        Value::Map(entries) => {
            let mut map = Map::new();
            for (k, v) in entries {
                map.insert(k.clone(), to_json(v, codec, special)?);
            }
            Json::Object(map)
        }
        Value::Bytes(_) | Value::Link(_) => {
            return Err(CodecError::cannot_encode(codec, value.kind()));
        }
    })
}

pub(crate) fn from_json(json: Json, codec: CodecType, special: &DecodeSpecial<'_>) -> CodecResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => number_to_value(&n, codec)?,
        Json::String(s) => Value::String(s),
        Json::Array(items) => Value::List(
            items
                .into_iter()
                .map(|v| from_json(v, codec, special))
                .collect::<CodecResult<_>>()?,
        ),
        Json::Object(map) => {
            if let Some(value) = special(&map)? {
                return Ok(value);
            }
            let mut out = BTreeMap::new();
            for (k, v) in map {
                out.insert(k, from_json(v, codec, special)?);
            }
            Value::Map(out)
        }
    })
}

fn number_to_value(n: &Number, codec: CodecType) -> CodecResult<Value> {
    if let Some(i) = n.as_i64() {
        Ok(Value::Integer(i))
    } else if n.is_u64() {
        Err(CodecError::decode(codec, format!("integer {n} out of range")))
    } else {
        n.as_f64()
            .map(Value::Float)
            .ok_or_else(|| CodecError::decode(codec, format!("unrepresentable number {n}")))
    }
}
