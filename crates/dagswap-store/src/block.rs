use bytes::Bytes;
use dagswap_codec::{codec_for, Codec, CodecResult, Value};
use dagswap_types::{Cid, CodecType, HashAlgorithm, Multihash};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hash algorithm used for new blocks unless the caller picks another.
pub const DEFAULT_HASH: HashAlgorithm = HashAlgorithm::Sha2_256;

/// A data payload bound to its content identifier.
///
/// Blocks built with [`Block::from_data`] always validate. Blocks built with
/// [`Block::with_cid`] carry a CID the caller vouches for; call
/// [`Block::validate`] before trusting one that arrived from elsewhere.
///
/// Cloning is cheap: the payload is reference counted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    cid: Cid,
    data: Bytes,
}

impl Block {
    /// Hash `data` with `algorithm` and address it with a CIDv1.
    pub fn from_data(data: impl Into<Bytes>, codec: CodecType, algorithm: HashAlgorithm) -> Self {
        let data = data.into();
        let cid = Cid::v1(codec, Multihash::from_digest(algorithm, &data));
        Self { cid, data }
    }

    /// A raw-codec block hashed with [`DEFAULT_HASH`].
    pub fn raw(data: impl Into<Bytes>) -> Self {
        Self::from_data(data, CodecType::Raw, DEFAULT_HASH)
    }

    /// Encode `value` with `codec` and build a block from the bytes.
    pub fn from_value(value: &Value, codec: CodecType, algorithm: HashAlgorithm) -> CodecResult<Self> {
        let data = codec_for(codec).encode(value)?;
        Ok(Self::from_data(data, codec, algorithm))
    }

    /// Pair `data` with a CID without recomputing the hash.
    pub fn with_cid(cid: Cid, data: impl Into<Bytes>) -> Self {
        Self {
            cid,
            data: data.into(),
        }
    }

    pub fn cid(&self) -> &Cid {
        &self.cid
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_parts(self) -> (Cid, Bytes) {
        (self.cid, self.data)
    }

    /// Recompute the digest and compare it with the CID.
    ///
    /// Returns `false` on mismatch. A mismatch is an expected outcome for
    /// blocks received from peers, not an error.
    pub fn validate(&self) -> bool {
        self.cid.multihash().verify(&self.data)
    }

    /// Decode the payload with the codec named by the CID.
    pub fn decode(&self) -> CodecResult<Value> {
        codec_for(self.cid.codec()).decode(&self.data)
    }

    /// Outbound links, as extracted by the CID's codec.
    pub fn extract_links(&self) -> CodecResult<Vec<Cid>> {
        codec_for(self.cid.codec()).extract_links(&self.data)
    }

    /// Outbound links, treating an undecodable payload as having none.
    ///
    /// Graph walks use this so that one corrupt block does not stop a
    /// traversal of everything else.
    pub fn links(&self) -> Vec<Cid> {
        match self.extract_links() {
            Ok(links) => links,
            Err(e) => {
                debug!(cid = %self.cid, error = %e, "payload has no decodable links");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("cid", &self.cid)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn from_data_builds_v1_cid() {
        let block = Block::from_data(&b"hello"[..], CodecType::Raw, HashAlgorithm::Blake3);
        assert_eq!(block.cid().codec(), CodecType::Raw);
        assert_eq!(block.cid().hash_algorithm(), HashAlgorithm::Blake3);
        assert_eq!(block.data().as_ref(), b"hello");
        assert!(block.validate());
    }

    #[test]
    fn same_data_same_cid() {
        assert_eq!(Block::raw(&b"x"[..]).cid(), Block::raw(&b"x"[..]).cid());
        assert_ne!(Block::raw(&b"x"[..]).cid(), Block::raw(&b"y"[..]).cid());
    }

    #[test]
    fn with_cid_trusts_caller_until_validated() {
        let good = Block::raw(&b"original"[..]);
        let forged = Block::with_cid(good.cid().clone(), &b"tampered"[..]);
        assert_eq!(forged.cid(), good.cid());
        assert!(!forged.validate());
    }

    #[test]
    fn identity_blocks_validate() {
        let block = Block::from_data(&b"inline"[..], CodecType::Raw, HashAlgorithm::Identity);
        assert!(block.validate());
        assert_eq!(block.cid().multihash().digest(), b"inline");
    }

    #[test]
    fn links_come_from_codec() {
        let child = Block::raw(&b"leaf"[..]);
        let value: Value = [("child", Value::Link(child.cid().clone()))].into_iter().collect();
        let parent = Block::from_value(&value, CodecType::DagJson, DEFAULT_HASH).unwrap();
        assert_eq!(parent.extract_links().unwrap(), vec![child.cid().clone()]);
        assert_eq!(parent.decode().unwrap(), value);
        assert!(child.links().is_empty());
    }

    #[test]
    fn undecodable_payload_has_no_links() {
        let block = Block::from_data(&b"{broken"[..], CodecType::DagJson, DEFAULT_HASH);
        assert!(block.extract_links().is_err());
        assert!(block.links().is_empty());
    }

    #[test]
    fn serde_roundtrip() {
        let block = Block::raw(&b"wire"[..]);
        let bin = bincode::serialize(&block).unwrap();
        assert_eq!(bincode::deserialize::<Block>(&bin).unwrap(), block);
    }

    proptest! {
        #[test]
        fn from_data_always_validates(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let block = Block::from_data(data.clone(), CodecType::Raw, DEFAULT_HASH);
            prop_assert!(block.validate());

            let mut mutated = data;
            mutated.push(0);
            let forged = Block::with_cid(block.cid().clone(), mutated);
            prop_assert!(!forged.validate());
        }
    }
}
