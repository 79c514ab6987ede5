use std::fmt;

use dagswap_crypto::{HashAlgorithm, HashRegistry};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{TypeError, TypeResult};
use crate::varint;

/// Self-describing digest: algorithm code + digest length + digest bytes.
///
/// For every algorithm except identity the digest length equals the
/// algorithm's fixed output size. For identity the digest is the original
/// input.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Multihash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Multihash {
    /// Hash `data` with `algorithm` and wrap the result.
    pub fn from_digest(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.hasher().hash(data),
        }
    }

    /// Hash `data` through `registry`, failing if it does not carry `algorithm`.
    pub fn from_digest_with(
        registry: &HashRegistry,
        algorithm: HashAlgorithm,
        data: &[u8],
    ) -> TypeResult<Self> {
        let digest = registry.digest(algorithm, data)?;
        Ok(Self { algorithm, digest })
    }

    /// Wrap an already computed digest, checking its length.
    pub fn wrap(algorithm: HashAlgorithm, digest: impl Into<Vec<u8>>) -> TypeResult<Self> {
        let digest = digest.into();
        if let Some(expected) = algorithm.digest_len() {
            if digest.len() != expected {
                return Err(TypeError::MalformedMultihash(format!(
                    "{algorithm} digest must be {expected} bytes, got {}",
                    digest.len()
                )));
            }
        }
        Ok(Self { algorithm, digest })
    }

    /// Parse the binary form, requiring that `bytes` contains exactly one multihash.
    pub fn from_bytes(bytes: &[u8]) -> TypeResult<Self> {
        let (mh, consumed) = Self::read(bytes)?;
        if consumed != bytes.len() {
            return Err(TypeError::MalformedMultihash(format!(
                "{} trailing bytes",
                bytes.len() - consumed
            )));
        }
        Ok(mh)
    }

    /// Parse a multihash from the front of `bytes`.
    ///
    /// Returns the multihash and the number of bytes consumed.
    pub fn read(bytes: &[u8]) -> TypeResult<(Self, usize)> {
        let (code, code_len) = varint::decode(bytes)
            .ok_or_else(|| TypeError::MalformedMultihash("bad algorithm varint".into()))?;
        let algorithm = HashAlgorithm::from_code(code)?;
        let (len, len_len) = varint::decode(&bytes[code_len..])
            .ok_or_else(|| TypeError::MalformedMultihash("bad length varint".into()))?;
        let start = code_len + len_len;
        let len = usize::try_from(len)
            .map_err(|_| TypeError::MalformedMultihash("length overflow".into()))?;
        let end = start
            .checked_add(len)
            .ok_or_else(|| TypeError::MalformedMultihash("length overflow".into()))?;
        if bytes.len() < end {
            return Err(TypeError::MalformedMultihash(format!(
                "declared {len} digest bytes, only {} available",
                bytes.len() - start
            )));
        }
        let mh = Self::wrap(algorithm, &bytes[start..end])?;
        Ok((mh, end))
    }

    /// Binary form: `varint(code) || varint(len) || digest`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.digest.len());
        varint::encode(self.algorithm.code(), &mut out);
        varint::encode(self.digest.len() as u64, &mut out);
        out.extend_from_slice(&self.digest);
        out
    }

    /// The hash algorithm.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest length in bytes.
    pub fn digest_len(&self) -> usize {
        self.digest.len()
    }

    /// The digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// Recompute the digest over `data` and compare.
    pub fn verify(&self, data: &[u8]) -> bool {
        self.algorithm.hasher().verify(data, &self.digest)
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({}:{})", self.algorithm, hex::encode(&self.digest))
    }
}

impl Serialize for Multihash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&hex::encode(self.to_bytes()))
        } else {
            serializer.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for Multihash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
            Multihash::from_bytes(&bytes).map_err(serde::de::Error::custom)
        } else {
            let bytes = serde_bytes_compat::deserialize(deserializer)?;
            Multihash::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

/// Byte-buffer deserialization shared by [`Multihash`] and [`crate::Cid`].
pub(crate) mod serde_bytes_compat {
    use std::fmt;

    use serde::de::{self, SeqAccess, Visitor};
    use serde::Deserializer;

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a byte buffer")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(byte) = seq.next_element::<u8>()? {
                out.push(byte);
            }
            Ok(out)
        }
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }
}
