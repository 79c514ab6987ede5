use std::fmt;
use std::str::FromStr;

use dagswap_crypto::HashAlgorithm;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec_type::CodecType;
use crate::error::{TypeError, TypeResult};
use crate::multihash::{serde_bytes_compat, Multihash};
use crate::varint;

/// CID version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CidVersion {
    /// Legacy form: implicit dag-pb codec, sha2-256 only, base58btc text.
    V0,
    /// General form: explicit codec and hash algorithm.
    V1,
}

impl CidVersion {
    pub const fn number(&self) -> u64 {
        match self {
            Self::V0 => 0,
            Self::V1 => 1,
        }
    }
}

/// Content identifier: a versioned, self-describing content address.
///
/// Two CIDs are equal iff version, codec and multihash all match. The text
/// form round-trips: `Cid::parse(&cid.to_string()) == Ok(cid)`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cid {
    version: CidVersion,
    codec: CodecType,
    multihash: Multihash,
}

/// Length of a v0 CID in base58btc.
const V0_TEXT_LEN: usize = 46;

impl Cid {
    /// Build a v1 CID.
    pub fn v1(codec: CodecType, multihash: Multihash) -> Self {
        Self {
            version: CidVersion::V1,
            codec,
            multihash,
        }
    }

    /// Build a v0 CID. The multihash must be a 32-byte sha2-256 digest.
    pub fn v0(multihash: Multihash) -> TypeResult<Self> {
        if multihash.algorithm() != HashAlgorithm::Sha2_256 || multihash.digest_len() != 32 {
            return Err(TypeError::MalformedCid(format!(
                "CIDv0 requires a sha2-256 multihash, got {}",
                multihash.algorithm()
            )));
        }
        Ok(Self {
            version: CidVersion::V0,
            codec: CodecType::DagPb,
            multihash,
        })
    }

    /// Hash `data` and build a v1 CID for it.
    pub fn for_data(codec: CodecType, algorithm: HashAlgorithm, data: &[u8]) -> Self {
        Self::v1(codec, Multihash::from_digest(algorithm, data))
    }

    pub fn version(&self) -> CidVersion {
        self.version
    }

    pub fn codec(&self) -> CodecType {
        self.codec
    }

    pub fn multihash(&self) -> &Multihash {
        &self.multihash
    }

    pub fn hash_algorithm(&self) -> HashAlgorithm {
        self.multihash.algorithm()
    }

    /// The same content address expressed as a v1 CID.
    pub fn to_v1(&self) -> Self {
        Self::v1(self.codec, self.multihash.clone())
    }

    /// Binary form. v0 is the bare multihash; v1 is
    /// `varint(1) || varint(codec) || multihash`.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self.version {
            CidVersion::V0 => self.multihash.to_bytes(),
            CidVersion::V1 => {
                let mh = self.multihash.to_bytes();
                let mut out = Vec::with_capacity(4 + mh.len());
                varint::encode(1, &mut out);
                varint::encode(self.codec.code(), &mut out);
                out.extend_from_slice(&mh);
                out
            }
        }
    }

    /// Parse the binary form.
    pub fn from_bytes(bytes: &[u8]) -> TypeResult<Self> {
        // A v0 CID is a bare sha2-256 multihash: 0x12 0x20 + 32 bytes.
        if bytes.len() == 34 && bytes[0] == 0x12 && bytes[1] == 0x20 {
            let mh = Multihash::from_bytes(bytes).map_err(malformed)?;
            return Self::v0(mh);
        }

        let (version, v_len) =
            varint::decode(bytes).ok_or_else(|| TypeError::MalformedCid("bad version varint".into()))?;
        if version != 1 {
            return Err(TypeError::InvalidVersion(version));
        }
        let (code, c_len) = varint::decode(&bytes[v_len..])
            .ok_or_else(|| TypeError::MalformedCid("bad codec varint".into()))?;
        let codec = CodecType::from_code(code)?;
        let mh = Multihash::from_bytes(&bytes[v_len + c_len..]).map_err(malformed)?;
        Ok(Self::v1(codec, mh))
    }

    /// Parse the text form.
    ///
    /// A 46-character string starting with `Qm` is a base58btc v0 CID. Any
    /// other input must be a multibase-prefixed v1 CID.
    pub fn parse(s: &str) -> TypeResult<Self> {
        if s.len() == V0_TEXT_LEN && s.starts_with("Qm") {
            let bytes = bs58::decode(s)
                .into_vec()
                .map_err(|e| TypeError::MalformedCid(e.to_string()))?;
            let mh = Multihash::from_bytes(&bytes).map_err(malformed)?;
            return Self::v0(mh);
        }

        let (_, bytes) = multibase::decode(s).map_err(|e| TypeError::MalformedCid(e.to_string()))?;
        let cid = Self::from_bytes(&bytes)?;
        if cid.version == CidVersion::V0 {
            return Err(TypeError::MalformedCid(
                "CIDv0 must be written in bare base58btc".into(),
            ));
        }
        Ok(cid)
    }

    /// Abbreviated text form for logs.
    pub fn short(&self) -> String {
        let s = self.to_string();
        if s.len() <= 12 {
            return s;
        }
        format!("{}…{}", &s[..4], &s[s.len() - 6..])
    }
}

/// Multihash problems inside a CID are reported as malformed CIDs, except for
/// unknown algorithms which keep their configuration-error identity.
fn malformed(err: TypeError) -> TypeError {
    match err {
        TypeError::MalformedMultihash(reason) => TypeError::MalformedCid(reason),
        other => other,
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            CidVersion::V0 => f.write_str(&bs58::encode(self.multihash.to_bytes()).into_string()),
            CidVersion::V1 => f.write_str(&multibase::encode(
                multibase::Base::Base32Lower,
                self.to_bytes(),
            )),
        }
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl FromStr for Cid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&[u8]> for Cid {
    type Error = TypeError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

impl Serialize for Cid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            serializer.serialize_bytes(&self.to_bytes())
        }
    }
}

impl<'de> Deserialize<'de> for Cid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Cid::parse(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = serde_bytes_compat::deserialize(deserializer)?;
            Cid::from_bytes(&bytes).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sha256(data: &[u8]) -> Multihash {
        Multihash::from_digest(HashAlgorithm::Sha2_256, data)
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn v0_requires_sha256() {
        assert!(Cid::v0(sha256(b"a")).is_ok());
        let blake = Multihash::from_digest(HashAlgorithm::Blake3, b"a");
        assert!(matches!(Cid::v0(blake), Err(TypeError::MalformedCid(_))));
    }

    #[test]
    fn v0_codec_is_dag_pb() {
        let cid = Cid::v0(sha256(b"a")).unwrap();
        assert_eq!(cid.codec(), CodecType::DagPb);
        assert_eq!(cid.version(), CidVersion::V0);
    }

    #[test]
    fn equality_covers_all_fields() {
        let mh = sha256(b"same");
        let raw = Cid::v1(CodecType::Raw, mh.clone());
        let json = Cid::v1(CodecType::DagJson, mh.clone());
        let v0 = Cid::v0(mh.clone()).unwrap();
        let pb = Cid::v1(CodecType::DagPb, mh);
        assert_ne!(raw, json);
        assert_ne!(v0, pb);
        assert_eq!(v0.to_v1(), pb);
    }

    // -----------------------------------------------------------------------
    // Text form
    // -----------------------------------------------------------------------

    #[test]
    fn v0_text_is_base58_qm() {
        let cid = Cid::v0(sha256(b"hello")).unwrap();
        let s = cid.to_string();
        assert!(s.starts_with("Qm"));
        assert_eq!(s.len(), 46);
        assert_eq!(Cid::parse(&s).unwrap(), cid);
    }

    #[test]
    fn v1_text_is_base32_multibase() {
        let cid = Cid::for_data(CodecType::Raw, HashAlgorithm::Sha2_256, b"hello");
        let s = cid.to_string();
        assert!(s.starts_with("bafkrei"), "{s}");
        assert_eq!(s.parse::<Cid>().unwrap(), cid);
    }

    #[test]
    fn v1_parses_other_multibase_prefixes() {
        let cid = Cid::for_data(CodecType::DagJson, HashAlgorithm::Blake3, b"x");
        let z = multibase::encode(multibase::Base::Base58Btc, cid.to_bytes());
        assert_eq!(Cid::parse(&z).unwrap(), cid);
    }

    #[test]
    fn garbage_text_is_malformed() {
        assert!(matches!(Cid::parse(""), Err(TypeError::MalformedCid(_))));
        assert!(matches!(Cid::parse("not a cid"), Err(TypeError::MalformedCid(_))));
        assert!(Cid::parse("QmNotReallyBase58!!!!!!!!!!!!!!!!!!!!!!!!!!!!!").is_err());
    }

    #[test]
    fn multibase_wrapped_v0_is_rejected() {
        let cid = Cid::v0(sha256(b"a")).unwrap();
        let wrapped = multibase::encode(multibase::Base::Base32Lower, cid.to_bytes());
        assert!(Cid::parse(&wrapped).is_err());
    }

    #[test]
    fn unknown_codec_is_unsupported() {
        let mut bytes = vec![0x01, 0x71];
        bytes.extend(sha256(b"a").to_bytes());
        assert_eq!(Cid::from_bytes(&bytes), Err(TypeError::UnsupportedCodec(0x71)));
    }

    #[test]
    fn bad_version_is_rejected() {
        let mut bytes = vec![0x02, 0x55];
        bytes.extend(sha256(b"a").to_bytes());
        assert_eq!(Cid::from_bytes(&bytes), Err(TypeError::InvalidVersion(2)));
    }

    #[test]
    fn truncated_multihash_is_malformed_cid() {
        let cid = Cid::for_data(CodecType::Raw, HashAlgorithm::Sha2_256, b"a");
        let bytes = cid.to_bytes();
        assert!(matches!(
            Cid::from_bytes(&bytes[..bytes.len() - 3]),
            Err(TypeError::MalformedCid(_))
        ));
    }

    #[test]
    fn short_form_is_abbreviated() {
        let cid = Cid::for_data(CodecType::Raw, HashAlgorithm::Sha2_256, b"a");
        assert!(cid.short().len() < cid.to_string().len());
    }

    #[test]
    fn serde_uses_text_for_json_and_bytes_for_bincode() {
        let cid = Cid::for_data(CodecType::DagJson, HashAlgorithm::Sha2_256, b"serde");
        let json = serde_json::to_string(&cid).unwrap();
        assert_eq!(json, format!("\"{cid}\""));
        assert_eq!(serde_json::from_str::<Cid>(&json).unwrap(), cid);

        let bin = bincode::serialize(&cid).unwrap();
        assert_eq!(bincode::deserialize::<Cid>(&bin).unwrap(), cid);
    }

    // -----------------------------------------------------------------------
    // Round-trip laws
    // -----------------------------------------------------------------------

    fn any_algorithm() -> impl Strategy<Value = HashAlgorithm> {
        prop::sample::select(HashAlgorithm::ALL.to_vec())
    }

    fn any_codec() -> impl Strategy<Value = CodecType> {
        prop::sample::select(CodecType::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn text_roundtrip(
            data in proptest::collection::vec(any::<u8>(), 0..256),
            algorithm in any_algorithm(),
            codec in any_codec(),
        ) {
            let cid = Cid::v1(codec, Multihash::from_digest(algorithm, &data));
            prop_assert_eq!(Cid::parse(&cid.to_string()).unwrap(), cid.clone());
            prop_assert_eq!(Cid::from_bytes(&cid.to_bytes()).unwrap(), cid);
        }

        #[test]
        fn v0_text_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let cid = Cid::v0(sha256(&data)).unwrap();
            prop_assert_eq!(Cid::parse(&cid.to_string()).unwrap(), cid);
        }

        #[test]
        fn parse_never_panics(s in "\\PC{0,80}") {
            let _ = Cid::parse(&s);
        }

        #[test]
        fn from_bytes_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..80)) {
            let _ = Cid::from_bytes(&bytes);
        }
    }
}
