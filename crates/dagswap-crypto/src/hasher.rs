use std::sync::Arc;

use sha2::Digest;

use crate::algorithm::HashAlgorithm;

/// One-shot hashing capability for a single algorithm.
///
/// Implementations are stateless; incremental hashing goes through
/// [`Hasher::streaming`], which must produce the same digest as a one-shot
/// [`Hasher::hash`] over the concatenated chunks.
pub trait Hasher: Send + Sync {
    /// The algorithm this hasher implements.
    fn algorithm(&self) -> HashAlgorithm;

    /// Hash `data` in one call.
    fn hash(&self, data: &[u8]) -> Vec<u8>;

    /// Start an incremental hash.
    fn streaming(&self) -> Box<dyn StreamingHasher>;

    /// Verify that `data` hashes to `expected`.
    fn verify(&self, data: &[u8], expected: &[u8]) -> bool {
        self.hash(data) == expected
    }
}

/// Incremental hash state: `update` any number of times, then `finish`.
pub trait StreamingHasher: Send {
    /// Feed another chunk.
    fn update(&mut self, chunk: &[u8]);

    /// Consume the state and produce the digest.
    fn finish(self: Box<Self>) -> Vec<u8>;
}

impl HashAlgorithm {
    /// The built-in hasher for this algorithm.
    ///
    /// Every [`HashAlgorithm`] variant has an implementation, so this never
    /// fails; use a [`crate::HashRegistry`] to restrict what callers may pick.
    pub fn hasher(&self) -> Arc<dyn Hasher> {
        match self {
            Self::Identity => Arc::new(IdentityHasher),
            Self::Sha2_256 => Arc::new(Sha256Hasher),
            Self::Sha2_512 => Arc::new(Sha512Hasher),
            Self::Blake3 => Arc::new(Blake3Hasher),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Identity "hasher": returns the input unchanged.
///
/// Useful for inlining tiny payloads or fixtures. It provides no collision
/// resistance and must be requested explicitly.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityHasher;

impl Hasher for IdentityHasher {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Identity
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        data.to_vec()
    }

    fn streaming(&self) -> Box<dyn StreamingHasher> {
        Box::new(IdentityState(Vec::new()))
    }
}

struct IdentityState(Vec<u8>);

impl StreamingHasher for IdentityState {
    fn update(&mut self, chunk: &[u8]) {
        self.0.extend_from_slice(chunk);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        let Self(buffer) = *self;
        buffer
    }
}

// ---------------------------------------------------------------------------
// SHA-2
// ---------------------------------------------------------------------------

/// SHA-256 via the `sha2` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha256Hasher;

impl Hasher for Sha256Hasher {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Sha2_256
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        sha2::Sha256::digest(data).to_vec()
    }

    fn streaming(&self) -> Box<dyn StreamingHasher> {
        Box::new(Sha2State(sha2::Sha256::new()))
    }
}

/// SHA-512 via the `sha2` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sha512Hasher;

impl Hasher for Sha512Hasher {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Sha2_512
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        sha2::Sha512::digest(data).to_vec()
    }

    fn streaming(&self) -> Box<dyn StreamingHasher> {
        Box::new(Sha2State(sha2::Sha512::new()))
    }
}

struct Sha2State<D>(D);

impl<D: Digest + Send> StreamingHasher for Sha2State<D> {
    fn update(&mut self, chunk: &[u8]) {
        Digest::update(&mut self.0, chunk);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        let Self(state) = *self;
        state.finalize().to_vec()
    }
}

// ---------------------------------------------------------------------------
// BLAKE3
// ---------------------------------------------------------------------------

/// BLAKE3 with 32-byte output.
#[derive(Clone, Copy, Debug, Default)]
pub struct Blake3Hasher;

impl Hasher for Blake3Hasher {
    fn algorithm(&self) -> HashAlgorithm {
        HashAlgorithm::Blake3
    }

    fn hash(&self, data: &[u8]) -> Vec<u8> {
        blake3::hash(data).as_bytes().to_vec()
    }

    fn streaming(&self) -> Box<dyn StreamingHasher> {
        Box::new(Blake3State(blake3::Hasher::new()))
    }
}

struct Blake3State(blake3::Hasher);

impl StreamingHasher for Blake3State {
    fn update(&mut self, chunk: &[u8]) {
        self.0.update(chunk);
    }

    fn finish(self: Box<Self>) -> Vec<u8> {
        self.0.finalize().as_bytes().to_vec()
    }
}
