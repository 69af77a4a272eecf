//! Standard message header.

use bytes::{Buf, BufMut, BytesMut};

/// Size of the header in bytes.
pub const HEADER_LEN: usize = 16;

/// Legacy reply opcode.
pub const OP_REPLY: i32 = 1;

/// The four header fields, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgHeader {
    /// Total message size, header included.
    pub message_length: i32,
    pub request_id: i32,
    pub response_to: i32,
    pub op_code: i32,
}

impl MsgHeader {
    /// Decode a header from the start of `input`.
    ///
    /// Returns `None` when fewer than [`HEADER_LEN`] bytes are available.
    pub fn parse(input: &[u8]) -> Option<Self> {
        if input.len() < HEADER_LEN {
            return None;
        }

        let mut buf = &input[..HEADER_LEN];
        Some(MsgHeader {
            message_length: buf.get_i32_le(),
            request_id: buf.get_i32_le(),
            response_to: buf.get_i32_le(),
            op_code: buf.get_i32_le(),
        })
    }

    /// Number of body bytes the header announces.
    ///
    /// Malformed lengths smaller than the header yield zero.
    pub fn body_len(&self) -> usize {
        usize::try_from(self.message_length)
            .unwrap_or(0)
            .saturating_sub(HEADER_LEN)
    }

    /// Append the encoded header to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_i32_le(self.message_length);
        buf.put_i32_le(self.request_id);
        buf.put_i32_le(self.response_to);
        buf.put_i32_le(self.op_code);
    }
}
