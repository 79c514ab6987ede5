//! Foundation types for dagswap.
//!
//! This crate provides the self-describing addressing scheme every other
//! dagswap crate builds on.
//!
//! # Key Types
//!
//! - [`Multihash`]: algorithm code + digest length + digest
//! - [`Cid`]: versioned content identifier (codec tag + multihash)
//! - [`CodecType`]: multicodec tag for the encoding of a block's payload
//!
//! Binary forms use unsigned LEB128 varints as in the multiformats
//! specifications. Text forms are base58btc for CID v0 and multibase
//! base32 (lowercase, `b` prefix) for CID v1.

pub mod cid;
pub mod codec_type;
pub mod error;
pub mod multihash;
pub mod varint;

pub use cid::{Cid, CidVersion};
pub use codec_type::CodecType;
pub use error::{TypeError, TypeResult};
pub use multihash::Multihash;

pub use dagswap_crypto::HashAlgorithm;
