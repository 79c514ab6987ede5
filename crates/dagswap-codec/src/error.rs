use dagswap_types::CodecType;
use thiserror::Error;

/// Errors from encoding, decoding, or codec lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported codec: {0:#x}")]
    UnsupportedCodec(u64),

    #[error("{codec} cannot encode {reason}")]
    CannotEncode { codec: CodecType, reason: String },

    #[error("{codec} encode error: {reason}")]
    Encode { codec: CodecType, reason: String },

    #[error("{codec} decode error: {reason}")]
    Decode { codec: CodecType, reason: String },
}

impl CodecError {
    pub(crate) fn decode(codec: CodecType, reason: impl ToString) -> Self {
        Self::Decode {
            codec,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn cannot_encode(codec: CodecType, reason: impl ToString) -> Self {
        Self::CannotEncode {
            codec,
            reason: reason.to_string(),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
