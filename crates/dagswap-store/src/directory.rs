use std::collections::BTreeMap;

use dagswap_codec::{Codec, DagJsonCodec, Value};
use dagswap_types::{Cid, CodecType, HashAlgorithm};
use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::{StoreError, StoreResult};

/// What a directory entry points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(Self::File),
            "directory" => Some(Self::Directory),
            _ => None,
        }
    }
}

/// One named child of a directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub cid: Cid,
    /// Cumulative size of the child in bytes.
    pub size: u64,
    pub kind: EntryKind,
}

impl DirectoryEntry {
    pub fn file(name: impl Into<String>, cid: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
            kind: EntryKind::File,
        }
    }

    pub fn directory(name: impl Into<String>, cid: Cid, size: u64) -> Self {
        Self {
            name: name.into(),
            cid,
            size,
            kind: EntryKind::Directory,
        }
    }
}

/// A directory block: a DAG-JSON map from entry name to
/// `{"cid": <link>, "size": <int>, "type": "file" | "directory"}`.
///
/// Names are unique; inserting an existing name replaces the entry. Entries
/// are kept sorted by name so equal directories encode to the same block.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Directory {
    entries: BTreeMap<String, DirectoryEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, returning the entry it replaced.
    pub fn insert(&mut self, entry: DirectoryEntry) -> Option<DirectoryEntry> {
        self.entries.insert(entry.name.clone(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<DirectoryEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&DirectoryEntry> {
        self.entries.get(name)
    }

    /// Entries in name order.
    pub fn entries(&self) -> impl Iterator<Item = &DirectoryEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_value(&self) -> Value {
        self.entries
            .values()
            .map(|entry| {
                let fields: Value = [
                    ("cid", Value::Link(entry.cid.clone())),
                    ("size", Value::Integer(entry.size as i64)),
                    ("type", Value::from(entry.kind.as_str())),
                ]
                .into_iter()
                .collect();
                (entry.name.clone(), fields)
            })
            .collect()
    }

    pub fn from_value(value: &Value) -> StoreResult<Self> {
        let map = value
            .as_map()
            .ok_or_else(|| shape(format!("directory is a {}", value.kind())))?;
        let mut dir = Self::new();
        for (name, fields) in map {
            let cid = fields
                .get("cid")
                .and_then(Value::as_link)
                .ok_or_else(|| shape(format!("entry {name:?} has no cid link")))?;
            let size = fields
                .get("size")
                .and_then(Value::as_integer)
                .and_then(|s| u64::try_from(s).ok())
                .ok_or_else(|| shape(format!("entry {name:?} has no valid size")))?;
            let kind = fields
                .get("type")
                .and_then(Value::as_str)
                .and_then(EntryKind::parse)
                .ok_or_else(|| shape(format!("entry {name:?} has no valid type")))?;
            dir.insert(DirectoryEntry {
                name: name.clone(),
                cid: cid.clone(),
                size,
                kind,
            });
        }
        Ok(dir)
    }

    /// Encode as a DAG-JSON block.
    pub fn to_block(&self, algorithm: HashAlgorithm) -> StoreResult<Block> {
        Ok(Block::from_value(&self.to_value(), CodecType::DagJson, algorithm)?)
    }

    /// Decode a directory block.
    pub fn from_block(block: &Block) -> StoreResult<Self> {
        if block.cid().codec() != CodecType::DagJson {
            return Err(shape(format!(
                "directory blocks are dag-json, got {}",
                block.cid().codec()
            )));
        }
        Self::from_value(&block.decode()?)
    }

    /// Size of the encoded directory block plus the sizes of all entries.
    pub fn cumulative_size(&self) -> StoreResult<u64> {
        let own = DagJsonCodec.encode(&self.to_value())?.len() as u64;
        Ok(self.entries.values().fold(own, |acc, e| acc.saturating_add(e.size)))
    }
}

fn shape(reason: String) -> StoreError {
    StoreError::Serialization(reason)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::DEFAULT_HASH;

    fn sample() -> (Directory, Block, Block) {
        let readme = Block::raw(&b"# readme"[..]);
        let nested = Directory::new().to_block(DEFAULT_HASH).unwrap();
        let mut dir = Directory::new();
        dir.insert(DirectoryEntry::file("README.md", readme.cid().clone(), readme.len() as u64));
        dir.insert(DirectoryEntry::directory("src", nested.cid().clone(), nested.len() as u64));
        (dir, readme, nested)
    }

    #[test]
    fn block_roundtrip() {
        let (dir, _, _) = sample();
        let block = dir.to_block(DEFAULT_HASH).unwrap();
        assert_eq!(block.cid().codec(), CodecType::DagJson);
        assert!(block.validate());
        assert_eq!(Directory::from_block(&block).unwrap(), dir);
    }

    #[test]
    fn links_point_at_entries() {
        let (dir, readme, nested) = sample();
        let block = dir.to_block(DEFAULT_HASH).unwrap();
        let links = block.extract_links().unwrap();
        assert_eq!(links, vec![readme.cid().clone(), nested.cid().clone()]);
    }

    #[test]
    fn insert_replaces_by_name() {
        let (mut dir, _, _) = sample();
        let replacement = Block::raw(&b"new readme"[..]);
        let old = dir.insert(DirectoryEntry::file(
            "README.md",
            replacement.cid().clone(),
            replacement.len() as u64,
        ));
        assert!(old.is_some());
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("README.md").unwrap().cid, *replacement.cid());
    }

    #[test]
    fn equal_directories_share_a_cid() {
        let (a, _, _) = sample();
        let (b, _, _) = sample();
        assert_eq!(
            a.to_block(DEFAULT_HASH).unwrap().cid(),
            b.to_block(DEFAULT_HASH).unwrap().cid()
        );
    }

    #[test]
    fn cumulative_size_adds_children() {
        let (dir, readme, nested) = sample();
        let own = dir.to_block(DEFAULT_HASH).unwrap().len() as u64;
        assert_eq!(
            dir.cumulative_size().unwrap(),
            own + readme.len() as u64 + nested.len() as u64
        );
    }

    #[test]
    fn non_dag_json_block_is_rejected() {
        let block = Block::raw(&b"{}"[..]);
        assert!(matches!(
            Directory::from_block(&block),
            Err(StoreError::Serialization(_))
        ));
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let value: Value = [(
            "broken",
            [("size", Value::Integer(1))].into_iter().collect::<Value>(),
        )]
        .into_iter()
        .collect();
        assert!(Directory::from_value(&value).is_err());
    }
}
