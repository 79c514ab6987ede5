use dagswap_store::Block;
use dagswap_types::Cid;
use serde::{Deserialize, Serialize};

/// Largest payload a single frame may carry.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Most CIDs carried by one `Have` frame. A CID encodes to well under 100
/// bytes, so a full frame stays far below [`MAX_MESSAGE_SIZE`].
pub const MAX_HAVE_CIDS: usize = 16 * 1024;

/// Marks a `Have` as part of the answer to the `Want` with id `want`.
/// `last` is set on the final frame of the answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WantReply {
    pub want: u64,
    pub last: bool,
}

/// All messages in the block exchange protocol.
///
/// `Want` with an empty list asks for the sender's whole inventory and is
/// answered with `Have` of every local CID. A non-empty `Want` is answered
/// with `Have` of the requested CIDs that are held, possibly none. Answers
/// carry the `Want` id in `reply` and may span several frames; unsolicited
/// announcements carry no reply. `Have` is never answered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitswapMessage {
    Have { cids: Vec<Cid>, reply: Option<WantReply> },
    Want { id: u64, cids: Vec<Cid> },
    BlockRequest { cid: Cid },
    BlockResponse { block: Block },
    BlockNotFound { cid: Cid },
    Ping { nonce: u64 },
    Pong { nonce: u64 },
}

impl BitswapMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::Have { .. } => 1,
            Self::Want { .. } => 2,
            Self::BlockRequest { .. } => 3,
            Self::BlockResponse { .. } => 4,
            Self::BlockNotFound { .. } => 5,
            Self::Ping { .. } => 6,
            Self::Pong { .. } => 7,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Have { .. } => "Have",
            Self::Want { .. } => "Want",
            Self::BlockRequest { .. } => "BlockRequest",
            Self::BlockResponse { .. } => "BlockResponse",
            Self::BlockNotFound { .. } => "BlockNotFound",
            Self::Ping { .. } => "Ping",
            Self::Pong { .. } => "Pong",
        }
    }

    pub fn is_known_tag(tag: u8) -> bool {
        (1..=7).contains(&tag)
    }

    /// Full-inventory query.
    pub fn want_everything(id: u64) -> Self {
        Self::Want {
            id,
            cids: Vec::new(),
        }
    }

    /// Unsolicited `Have` frames for `cids`, at most [`MAX_HAVE_CIDS`] each.
    /// Empty input yields no frames.
    pub fn announcements(cids: &[Cid]) -> Vec<Self> {
        cids.chunks(MAX_HAVE_CIDS)
            .map(|chunk| Self::Have {
                cids: chunk.to_vec(),
                reply: None,
            })
            .collect()
    }

    /// The `Have` frames answering `Want` `want`. Always at least one frame,
    /// and only the final frame is marked `last`.
    pub fn answer(want: u64, cids: &[Cid]) -> Vec<Self> {
        let chunks: Vec<&[Cid]> = if cids.is_empty() {
            vec![cids]
        } else {
            cids.chunks(MAX_HAVE_CIDS).collect()
        };
        let count = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| Self::Have {
                cids: chunk.to_vec(),
                reply: Some(WantReply {
                    want,
                    last: i + 1 == count,
                }),
            })
            .collect()
    }
}
