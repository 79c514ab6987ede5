//! Wire protocol for dagswap block exchange.
//!
//! Peers trade [`BitswapMessage`]s: inventory (`Have`), interest (`Want`),
//! single-block requests and their answers, and liveness pings. Each message
//! travels as one frame, `[u32 BE length][u8 type tag][bincode payload]`,
//! where `length` covers the tag and the payload.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{BitswapCodec, FrameBuffer};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{BitswapMessage, WantReply, MAX_HAVE_CIDS, MAX_MESSAGE_SIZE};
