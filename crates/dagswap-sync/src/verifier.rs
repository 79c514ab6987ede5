use dagswap_store::Block;
use dagswap_types::Cid;
use thiserror::Error;

/// Why a received block was refused.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("payload of {0} does not hash to its CID")]
    HashMismatch(Cid),

    #[error("asked for {requested}, got {received}")]
    Unrequested { requested: Cid, received: Cid },
}

/// Checks blocks that arrive from peers before they reach the store.
pub struct BlockVerifier;

impl BlockVerifier {
    pub fn verify(requested: &Cid, block: &Block) -> Result<(), Rejection> {
        if block.cid() != requested {
            return Err(Rejection::Unrequested {
                requested: requested.clone(),
                received: block.cid().clone(),
            });
        }
        if !block.validate() {
            return Err(Rejection::HashMismatch(requested.clone()));
        }
        Ok(())
    }
}
