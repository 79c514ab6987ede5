use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Multicodec tag describing how a block's payload is encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CodecType {
    /// Opaque bytes, no links.
    Raw,
    /// Protobuf-encoded DAG node. The only codec CID v0 can express.
    DagPb,
    /// JSON with embedded `{"/": "<cid>"}` links.
    DagJson,
    /// Plain JSON, no links.
    Json,
}

impl CodecType {
    pub const ALL: [CodecType; 4] = [Self::Raw, Self::DagPb, Self::DagJson, Self::Json];

    /// Multicodec code.
    pub const fn code(&self) -> u64 {
        match self {
            Self::Raw => 0x55,
            Self::DagPb => 0x70,
            Self::DagJson => 0x0129,
            Self::Json => 0x0200,
        }
    }

    /// Look up a codec by multicodec code.
    pub fn from_code(code: u64) -> TypeResult<Self> {
        match code {
            0x55 => Ok(Self::Raw),
            0x70 => Ok(Self::DagPb),
            0x0129 => Ok(Self::DagJson),
            0x0200 => Ok(Self::Json),
            other => Err(TypeError::UnsupportedCodec(other)),
        }
    }

    /// Multicodec table name.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::DagPb => "dag-pb",
            Self::DagJson => "dag-json",
            Self::Json => "json",
        }
    }

    /// Whether payloads in this encoding can carry CID links.
    pub const fn supports_links(&self) -> bool {
        matches!(self, Self::DagPb | Self::DagJson)
    }
}

impl std::fmt::Display for CodecType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
