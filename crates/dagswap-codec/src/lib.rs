//! Payload encodings for dagswap blocks.
//!
//! A block's CID names the codec its bytes are encoded with. This crate
//! turns those bytes into a [`Value`] and back, and extracts the CID links a
//! payload embeds so the DAG layer can build edges without knowing any
//! particular format.
//!
//! | Codec | Links | Notes |
//! |---|---|---|
//! | [`RawCodec`] | never | opaque bytes |
//! | [`JsonCodec`] | never | plain JSON, no bytes or links |
//! | [`DagJsonCodec`] | `{"/": "<cid>"}` | bytes as `{"/": {"bytes": "<base64>"}}` |
//! | [`DagPbCodec`] | `Links[].Hash` | protobuf `PBNode`, the CIDv0 codec |
//!
//! Codecs are obtained from a [`CodecRegistry`]; [`detect_codec`] sniffs the
//! encoding of unlabelled bytes.

pub mod dag_json;
pub mod dag_pb;
pub mod error;
pub mod json;
pub mod raw;
pub mod registry;
pub mod value;

pub use dag_json::DagJsonCodec;
pub use dag_pb::DagPbCodec;
pub use error::{CodecError, CodecResult};
pub use json::JsonCodec;
pub use raw::RawCodec;
pub use registry::{codec_for, detect_codec, CodecRegistry};
pub use value::Value;

use dagswap_types::{Cid, CodecType};

/// A payload encoding.
///
/// Implementations are stateless and shared behind `Arc<dyn Codec>`.
pub trait Codec: Send + Sync {
    /// The multicodec this implementation handles.
    fn codec_type(&self) -> CodecType;

    /// Encode a value. Fails with [`CodecError::CannotEncode`] if the value
    /// has a shape this codec cannot represent.
    fn encode(&self, value: &Value) -> CodecResult<Vec<u8>>;

    /// Decode bytes into a value.
    fn decode(&self, bytes: &[u8]) -> CodecResult<Value>;

    /// Whether [`Codec::encode`] would accept `value`.
    fn can_encode(&self, value: &Value) -> bool;

    /// CIDs embedded in an encoded payload, in document order.
    fn extract_links(&self, bytes: &[u8]) -> CodecResult<Vec<Cid>> {
        if !self.codec_type().supports_links() {
            return Ok(Vec::new());
        }
        Ok(self.decode(bytes)?.links())
    }
}
