use bytes::{Buf, BytesMut};

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::{BitswapMessage, MAX_MESSAGE_SIZE};

const HEADER_LEN: usize = 5;

/// Codec for encoding/decoding block exchange messages.
pub struct BitswapCodec;

impl BitswapCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &BitswapMessage) -> ProtocolResult<Vec<u8>> {
        let payload = Self::encode_payload(msg)?;
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Decode one framed message from the front of `data`. Returns the
    /// message and the number of bytes it occupied.
    pub fn decode(data: &[u8]) -> ProtocolResult<(BitswapMessage, usize)> {
        let total = match Self::frame_len(data)? {
            Some(total) => total,
            None => {
                return Err(ProtocolError::FramingError(format!(
                    "incomplete: have {} bytes",
                    data.len()
                )))
            }
        };
        let msg = Self::decode_frame(&data[4..total])?;
        Ok((msg, total))
    }

    /// Decode a message that must fill `data` exactly.
    pub fn decode_exact(data: &[u8]) -> ProtocolResult<BitswapMessage> {
        let (msg, consumed) = Self::decode(data)?;
        if consumed != data.len() {
            return Err(ProtocolError::FramingError(format!(
                "{} trailing bytes after frame",
                data.len() - consumed
            )));
        }
        Ok(msg)
    }

    /// Encode payload only (no framing).
    pub fn encode_payload(msg: &BitswapMessage) -> ProtocolResult<Vec<u8>> {
        bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))
    }

    /// Decode payload only (no framing).
    pub fn decode_payload(data: &[u8]) -> ProtocolResult<BitswapMessage> {
        bincode::deserialize(data).map_err(|e| ProtocolError::Deserialization(e.to_string()))
    }

    /// Total frame size announced by the header, or `None` while fewer
    /// than that many bytes are available.
    fn frame_len(data: &[u8]) -> ProtocolResult<Option<usize>> {
        let Some(header) = data.get(..4) else {
            return Ok(None);
        };
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(header);
        let len = u32::from_be_bytes(len_bytes) as usize;
        if len < 1 {
            return Err(ProtocolError::FramingError("zero-length frame".into()));
        }
        if len - 1 > MAX_MESSAGE_SIZE {
            return Err(ProtocolError::MessageTooLarge {
                size: len - 1,
                max: MAX_MESSAGE_SIZE,
            });
        }
        let total = 4 + len;
        Ok((data.len() >= total).then_some(total))
    }

    /// `frame` is the tag byte followed by the payload.
    fn decode_frame(frame: &[u8]) -> ProtocolResult<BitswapMessage> {
        let (&tag, payload) = frame
            .split_first()
            .ok_or_else(|| ProtocolError::FramingError("missing tag".into()))?;
        if !BitswapMessage::is_known_tag(tag) {
            return Err(ProtocolError::InvalidMessageType(tag));
        }
        let msg = Self::decode_payload(payload)?;
        if msg.type_tag() != tag {
            return Err(ProtocolError::TagMismatch {
                tag,
                actual: msg.type_name(),
            });
        }
        Ok(msg)
    }
}

/// Reassembles frames from a byte stream that may split or merge them.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: BytesMut,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// The next complete message, `Ok(None)` if more bytes are needed.
    ///
    /// A malformed frame is an error and leaves the buffer unusable; the
    /// stream should be dropped.
    pub fn next_message(&mut self) -> ProtocolResult<Option<BitswapMessage>> {
        let Some(total) = BitswapCodec::frame_len(&self.buf)? else {
            return Ok(None);
        };
        let msg = BitswapCodec::decode_frame(&self.buf[4..total])?;
        self.buf.advance(total);
        Ok(Some(msg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::WantReply;
    use dagswap_store::Block;
    use dagswap_types::Cid;
    use proptest::prelude::*;

    fn block(data: &[u8]) -> Block {
        Block::raw(data.to_vec())
    }

    fn cid(data: &[u8]) -> Cid {
        block(data).cid().clone()
    }

    fn all_messages() -> Vec<BitswapMessage> {
        vec![
            BitswapMessage::Have {
                cids: vec![cid(b"a"), cid(b"b")],
                reply: None,
            },
            BitswapMessage::Have {
                cids: vec![cid(b"b")],
                reply: Some(WantReply { want: 4, last: true }),
            },
            BitswapMessage::want_everything(4),
            BitswapMessage::Want {
                id: 5,
                cids: vec![cid(b"c")],
            },
            BitswapMessage::BlockRequest { cid: cid(b"d") },
            BitswapMessage::BlockResponse { block: block(b"e") },
            BitswapMessage::BlockNotFound { cid: cid(b"f") },
            BitswapMessage::Ping { nonce: 7 },
            BitswapMessage::Pong { nonce: u64::MAX },
        ]
    }

    // -----------------------------------------------------------------------
    // Framing
    // -----------------------------------------------------------------------

    #[test]
    fn every_message_roundtrips() {
        for msg in all_messages() {
            let encoded = BitswapCodec::encode(&msg).unwrap();
            assert_eq!(encoded[4], msg.type_tag());
            let (decoded, consumed) = BitswapCodec::decode(&encoded).unwrap();
            assert_eq!(consumed, encoded.len());
            assert_eq!(decoded, msg, "{}", msg.type_name());
        }
    }

    #[test]
    fn block_response_keeps_a_valid_block() {
        let msg = BitswapMessage::BlockResponse { block: block(b"payload") };
        let decoded = BitswapCodec::decode_exact(&BitswapCodec::encode(&msg).unwrap()).unwrap();
        match decoded {
            BitswapMessage::BlockResponse { block } => assert!(block.validate()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn type_tags_unique() {
        let mut tags: Vec<u8> = all_messages().iter().map(|m| m.type_tag()).collect();
        tags.sort();
        tags.dedup();
        assert_eq!(tags, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn decode_truncated() {
        let err = BitswapCodec::decode(&[0, 0, 0]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));

        let encoded = BitswapCodec::encode(&BitswapMessage::Ping { nonce: 1 }).unwrap();
        let err = BitswapCodec::decode(&encoded[..encoded.len() - 1]).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn decode_zero_length() {
        let data = [0u8, 0, 0, 0, 0];
        let err = BitswapCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::FramingError(_)));
    }

    #[test]
    fn oversized_header_is_rejected_before_buffering() {
        let len = (MAX_MESSAGE_SIZE as u32) + 2;
        let mut data = len.to_be_bytes().to_vec();
        data.push(1);
        let err = BitswapCodec::decode(&data).unwrap_err();
        assert!(matches!(err, ProtocolError::MessageTooLarge { .. }));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut encoded = BitswapCodec::encode(&BitswapMessage::Ping { nonce: 1 }).unwrap();
        encoded[4] = 99;
        assert_eq!(
            BitswapCodec::decode(&encoded).unwrap_err(),
            ProtocolError::InvalidMessageType(99)
        );
    }

    #[test]
    fn mismatched_tag_is_rejected() {
        let mut encoded = BitswapCodec::encode(&BitswapMessage::Ping { nonce: 1 }).unwrap();
        encoded[4] = BitswapMessage::Pong { nonce: 0 }.type_tag();
        assert!(matches!(
            BitswapCodec::decode(&encoded).unwrap_err(),
            ProtocolError::TagMismatch { .. }
        ));
    }

    #[test]
    fn trailing_bytes_fail_exact_decode() {
        let mut encoded = BitswapCodec::encode(&BitswapMessage::Ping { nonce: 1 }).unwrap();
        encoded.push(0);
        assert!(BitswapCodec::decode(&encoded).is_ok());
        assert!(BitswapCodec::decode_exact(&encoded).is_err());
    }

    // -----------------------------------------------------------------------
    // Stream reassembly
    // -----------------------------------------------------------------------

    #[test]
    fn frame_buffer_handles_split_and_merged_frames() {
        let messages = all_messages();
        let stream: Vec<u8> = messages
            .iter()
            .flat_map(|m| BitswapCodec::encode(m).unwrap())
            .collect();

        let mut buffer = FrameBuffer::new();
        let mut decoded = Vec::new();
        for chunk in stream.chunks(7) {
            buffer.extend(chunk);
            while let Some(msg) = buffer.next_message().unwrap() {
                decoded.push(msg);
            }
        }
        assert_eq!(decoded, messages);
        assert_eq!(buffer.buffered(), 0);
    }

    proptest! {
        #[test]
        fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = BitswapCodec::decode(&data);
        }

        #[test]
        fn have_lists_roundtrip(seeds in proptest::collection::vec(any::<u64>(), 0..16)) {
            let cids: Vec<Cid> = seeds.iter().map(|s| cid(&s.to_be_bytes())).collect();
            let msg = BitswapMessage::Have { cids, reply: None };
            let decoded = BitswapCodec::decode_exact(&BitswapCodec::encode(&msg).unwrap()).unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}
