//! Backend messages sent by the decoy.

use bytes::{BufMut, Bytes, BytesMut};

/// Transaction status byte for "idle", the only state the decoy reports.
const STATUS_IDLE: u8 = b'I';

/// Messages the server side of the protocol can emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMessage<'a> {
    /// `R` with method code 0: authentication succeeded.
    AuthenticationOk,
    /// `K`: cancellation key for this backend.
    BackendKeyData { process_id: u32, secret_key: u32 },
    /// `Z`: ready for a new query, outside any transaction.
    ReadyForQuery,
    /// `E`: error text, NUL terminated.
    ErrorResponse(&'a str),
}

impl BackendMessage<'_> {
    pub fn tag(&self) -> u8 {
        match self {
            BackendMessage::AuthenticationOk => b'R',
            BackendMessage::BackendKeyData { .. } => b'K',
            BackendMessage::ReadyForQuery => b'Z',
            BackendMessage::ErrorResponse(_) => b'E',
        }
    }

    fn payload_len(&self) -> usize {
        match self {
            BackendMessage::AuthenticationOk => 4,
            BackendMessage::BackendKeyData { .. } => 8,
            BackendMessage::ReadyForQuery => 1,
            BackendMessage::ErrorResponse(text) => text.len() + 1,
        }
    }

    /// Append the encoded message to `buf`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tag());
        buf.put_u32((4 + self.payload_len()) as u32);

        match self {
            BackendMessage::AuthenticationOk => buf.put_u32(0),
            BackendMessage::BackendKeyData {
                process_id,
                secret_key,
            } => {
                buf.put_u32(*process_id);
                buf.put_u32(*secret_key);
            }
            BackendMessage::ReadyForQuery => buf.put_u8(STATUS_IDLE),
            BackendMessage::ErrorResponse(text) => {
                buf.put_slice(text.as_bytes());
                buf.put_u8(0);
            }
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(5 + self.payload_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }
}
