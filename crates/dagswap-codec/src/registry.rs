use std::collections::BTreeMap;
use std::sync::Arc;

use dagswap_types::CodecType;

use crate::dag_json::DagJsonCodec;
use crate::dag_pb::{DagPbCodec, PbNode};
use crate::error::{CodecError, CodecResult};
use crate::json::JsonCodec;
use crate::raw::RawCodec;
use crate::Codec;

/// The built-in implementation for `codec_type`.
pub fn codec_for(codec_type: CodecType) -> Arc<dyn Codec> {
    match codec_type {
        CodecType::Raw => Arc::new(RawCodec),
        CodecType::Json => Arc::new(JsonCodec),
        CodecType::DagJson => Arc::new(DagJsonCodec),
        CodecType::DagPb => Arc::new(DagPbCodec),
    }
}

/// Factory for [`Codec`]s.
///
/// [`CodecRegistry::standard`] carries every built-in codec. A registry can
/// be narrowed, or have an implementation replaced with [`register`].
///
/// [`register`]: CodecRegistry::register
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: BTreeMap<CodecType, Arc<dyn Codec>>,
}

impl CodecRegistry {
    pub fn standard() -> Self {
        Self::with_codecs(CodecType::ALL)
    }

    pub fn with_codecs(codecs: impl IntoIterator<Item = CodecType>) -> Self {
        Self {
            codecs: codecs.into_iter().map(|c| (c, codec_for(c))).collect(),
        }
    }

    /// Install `codec`, replacing any existing implementation for its type.
    pub fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.codec_type(), codec);
    }

    pub fn is_supported(&self, codec_type: CodecType) -> bool {
        self.codecs.contains_key(&codec_type)
    }

    pub fn create(&self, codec_type: CodecType) -> CodecResult<Arc<dyn Codec>> {
        self.codecs
            .get(&codec_type)
            .cloned()
            .ok_or(CodecError::UnsupportedCodec(codec_type.code()))
    }

    /// Look up a codec by raw multicodec code.
    pub fn create_by_code(&self, code: u64) -> CodecResult<Arc<dyn Codec>> {
        let codec_type = CodecType::from_code(code).map_err(|_| CodecError::UnsupportedCodec(code))?;
        self.create(codec_type)
    }

    pub fn codec_types(&self) -> impl Iterator<Item = CodecType> + '_ {
        self.codecs.keys().copied()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl std::fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Best-effort guess at the encoding of `bytes`.
///
/// Canonical DAG-PB wins, then JSON containing link or bytes objects
/// (DAG-JSON), then any other JSON. Everything else is raw. Empty input has
/// no meaningful encoding and yields `None`.
pub fn detect_codec(bytes: &[u8]) -> Option<CodecType> {
    if bytes.is_empty() {
        return None;
    }
    if PbNode::decode(bytes).is_ok() {
        return Some(CodecType::DagPb);
    }
    if serde_json::from_slice::<serde_json::Value>(bytes).is_ok() {
        let is_dag_json = DagJsonCodec
            .decode(bytes)
            .map(|v| v.has_binary_or_links())
            .unwrap_or(false);
        return Some(if is_dag_json {
            CodecType::DagJson
        } else {
            CodecType::Json
        });
    }
    Some(CodecType::Raw)
}
