//! Two-phase handshake responder.

use super::message::BackendMessage;
use crate::protocols::{Codec, Outcome};
use tracing::{debug, trace};

const PROCESS_ID: u32 = 12345;
const SECRET_KEY: u32 = 67890;

/// Text of the error returned for every query.
pub const QUERY_ERROR_TEXT: &str = "PostgreSQL mock server ready";

/// Where the connection is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupState {
    /// Nothing received yet; the next read is the startup message.
    AwaitingStartup,
    /// Handshake done; every read is treated as a query.
    Ready,
}

/// Answers the startup message with a successful login, then rejects
/// every query.
pub struct PostgresCodec {
    state: StartupState,
}

impl PostgresCodec {
    pub fn new() -> Self {
        PostgresCodec {
            state: StartupState::AwaitingStartup,
        }
    }

    pub fn state(&self) -> StartupState {
        self.state
    }
}

impl Default for PostgresCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for PostgresCodec {
    fn respond(&mut self, request: &[u8]) -> Outcome {
        trace!(data = ?&request[..request.len().min(50)], "PostgreSQL input");

        match self.state {
            StartupState::AwaitingStartup => {
                debug!(len = request.len(), "PostgreSQL startup message");
                self.state = StartupState::Ready;

                Outcome::Reply(vec![
                    BackendMessage::AuthenticationOk.encode(),
                    BackendMessage::BackendKeyData {
                        process_id: PROCESS_ID,
                        secret_key: SECRET_KEY,
                    }
                    .encode(),
                    BackendMessage::ReadyForQuery.encode(),
                ])
            }
            StartupState::Ready => {
                debug!(len = request.len(), "PostgreSQL query");
                Outcome::single(BackendMessage::ErrorResponse(QUERY_ERROR_TEXT).encode())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SSL-less startup message for user "scan", protocol 3.0.
    const STARTUP: &[u8] = b"\x00\x00\x00\x13\x00\x03\x00\x00user\x00scan\x00\x00";

    fn concat(outcome: Outcome) -> Vec<u8> {
        match outcome {
            Outcome::Reply(frames) => frames.concat(),
            Outcome::Close => panic!("unexpected close"),
        }
    }

    #[test]
    fn test_handshake_bytes() {
        let mut codec = PostgresCodec::new();
        assert_eq!(codec.state(), StartupState::AwaitingStartup);

        let reply = concat(codec.respond(STARTUP));
        let expected: &[u8] = b"R\x00\x00\x00\x08\x00\x00\x00\x00\
            K\x00\x00\x00\x0c\x00\x00\x30\x39\x00\x01\x09\x32\
            Z\x00\x00\x00\x05I";
        assert_eq!(reply, expected);
        assert_eq!(codec.state(), StartupState::Ready);
    }

    #[test]
    fn test_handshake_ignores_content() {
        let mut a = PostgresCodec::new();
        let mut b = PostgresCodec::new();
        assert_eq!(a.respond(STARTUP), b.respond(b"garbage"));
    }

    #[test]
    fn test_queries_get_one_error() {
        let mut codec = PostgresCodec::new();
        codec.respond(STARTUP);

        for query in [
            &b"Q\x00\x00\x00\x0dSELECT 1\x00"[..],
            &b"X\x00\x00\x00\x04"[..],
            &b"?"[..],
        ] {
            match codec.respond(query) {
                Outcome::Reply(frames) => {
                    assert_eq!(frames.len(), 1);
                    let frame = &frames[0];
                    assert_eq!(frame[0], b'E');
                    let declared = u32::from_be_bytes([frame[1], frame[2], frame[3], frame[4]]);
                    assert_eq!(declared as usize, frame.len() - 1);
                    assert_eq!(&frame[5..frame.len() - 1], QUERY_ERROR_TEXT.as_bytes());
                    assert_eq!(frame[frame.len() - 1], 0);
                }
                Outcome::Close => panic!("unexpected close"),
            }
            assert_eq!(codec.state(), StartupState::Ready);
        }
    }
}
