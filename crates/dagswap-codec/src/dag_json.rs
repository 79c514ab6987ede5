use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use dagswap_types::{Cid, CodecType};
use serde_json::{json, Map, Value as Json};

use crate::error::{CodecError, CodecResult};
use crate::json::{from_json, to_json};
use crate::value::Value;
use crate::Codec;

/// Reserved key marking a link or bytes object.
const SLASH: &str = "/";

/// JSON with links and bytes.
///
/// - a link is `{"/": "<cid text>"}`
/// - bytes are `{"/": {"bytes": "<unpadded base64>"}}`
///
/// Any other object whose only key is `"/"` is rejected on decode, so a map
/// can never be confused with a link.
#[derive(Clone, Copy, Debug, Default)]
pub struct DagJsonCodec;

impl Codec for DagJsonCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::DagJson
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        let json = to_json(value, CodecType::DagJson, &encode_special)?;
        serde_json::to_vec(&json).map_err(|e| CodecError::Encode {
            codec: CodecType::DagJson,
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::decode(CodecType::DagJson, e))?;
        from_json(json, CodecType::DagJson, &decode_special)
    }

    fn can_encode(&self, value: &Value) -> bool {
        value.floats_are_finite()
    }
}

fn encode_special(value: &Value) -> Option<Json> {
    match value {
        Value::Link(cid) => Some(json!({ "/": cid.to_string() })),
        Value::Bytes(bytes) => Some(json!({ "/": { "bytes": STANDARD_NO_PAD.encode(bytes) } })),
        _ => None,
    }
}

fn decode_special(map: &Map<String, Json>) -> CodecResult<Option<Value>> {
    if map.len() != 1 {
        return Ok(None);
    }
    let Some(inner) = map.get(SLASH) else {
        return Ok(None);
    };
    match inner {
        Json::String(text) => Cid::parse(text)
            .map(|cid| Some(Value::Link(cid)))
            .map_err(|e| CodecError::decode(CodecType::DagJson, e)),
        Json::Object(obj) if obj.len() == 1 => match obj.get("bytes") {
            Some(Json::String(b64)) => decode_base64(b64).map(|b| Some(Value::Bytes(b))),
            _ => Err(CodecError::decode(CodecType::DagJson, "malformed bytes object")),
        },
        _ => Err(CodecError::decode(CodecType::DagJson, "reserved \"/\" key")),
    }
}

fn decode_base64(text: &str) -> CodecResult<Vec<u8>> {
    STANDARD_NO_PAD
        .decode(text)
        .or_else(|_| STANDARD.decode(text))
        .map_err(|e| CodecError::decode(CodecType::DagJson, e))
}
