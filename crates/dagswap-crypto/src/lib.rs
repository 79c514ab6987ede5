//! Hash algorithms for content addressing.
//!
//! Every digest in dagswap is produced through a [`Hasher`] obtained from a
//! [`HashRegistry`]. The registry is an explicit factory: callers construct
//! one (usually [`HashRegistry::standard`]) and ask it for hashers by
//! [`HashAlgorithm`]. Algorithms the registry does not carry fail with
//! [`CryptoError::UnsupportedAlgorithm`].
//!
//! # Algorithms
//!
//! - [`HashAlgorithm::Sha2_256`] -- the default for new blocks
//! - [`HashAlgorithm::Sha2_512`]
//! - [`HashAlgorithm::Blake3`]
//! - [`HashAlgorithm::Identity`] -- the "digest" is the input itself. This
//!   offers no integrity protection beyond equality of bytes and is never
//!   chosen implicitly.
//!
//! All crypto operations wrap established libraries.

pub mod algorithm;
pub mod error;
pub mod hasher;
pub mod registry;

pub use algorithm::HashAlgorithm;
pub use error::{CryptoError, CryptoResult};
pub use hasher::{Blake3Hasher, Hasher, IdentityHasher, Sha256Hasher, Sha512Hasher, StreamingHasher};
pub use registry::HashRegistry;
