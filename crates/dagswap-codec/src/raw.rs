use dagswap_types::{Cid, CodecType};

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use crate::Codec;

/// Opaque bytes. Encodes only [`Value::Bytes`] and never carries links.
#[derive(Clone, Copy, Debug, Default)]
pub struct RawCodec;

impl Codec for RawCodec {
    fn codec_type(&self) -> CodecType {
        CodecType::Raw
    }

    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>> {
        match value {
            Value::Bytes(bytes) => Ok(bytes.clone()),
            other => Err(CodecError::cannot_encode(CodecType::Raw, other.kind())),
        }
    }

    fn decode(&self, bytes: &[u8]) -> CodecResult<Value> {
        Ok(Value::Bytes(bytes.to_vec()))
    }

    fn can_encode(&self, value: &Value) -> bool {
        matches!(value, Value::Bytes(_))
    }

    fn extract_links(&self, _bytes: &[u8]) -> CodecResult<Vec<Cid>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_pass_through() {
        let codec = RawCodec;
        let encoded = codec.encode(&Value::Bytes(b"hello".to_vec())).unwrap();
        assert_eq!(encoded, b"hello");
        assert_eq!(codec.decode(&encoded).unwrap(), Value::Bytes(b"hello".to_vec()));
    }

    #[test]
    fn rejects_structured_values() {
        let codec = RawCodec;
        assert!(!codec.can_encode(&Value::from("text")));
        assert!(matches!(
            codec.encode(&Value::Integer(1)),
            Err(CodecError::CannotEncode { .. })
        ));
    }

    #[test]
    fn never_has_links() {
        assert!(RawCodec.extract_links(b"{\"/\":\"x\"}").unwrap().is_empty());
    }
}
