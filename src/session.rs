//! Per-connection session loop.
//!
//! A session owns one accepted stream and a codec. It reads a bounded
//! chunk, hands it to the codec, writes whatever frames come back and
//! repeats until the peer goes away or the codec gives up. The stream is
//! dropped, and so closed, on every exit path.

use crate::protocols::{Codec, Outcome};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace};

/// Default size of a single read.
pub const DEFAULT_READ_CHUNK: usize = 1024;

/// Why a session ended without an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed its side (read returned zero bytes).
    PeerClosed,
    /// The codec could not answer the input.
    CodecClosed,
}

/// One connection and the codec answering it.
pub struct Session<S> {
    stream: S,
    peer: SocketAddr,
    codec: Box<dyn Codec>,
    read_chunk: usize,
    exchanges: u64,
    bytes_in: u64,
    bytes_out: u64,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, peer: SocketAddr, codec: Box<dyn Codec>, read_chunk: usize) -> Self {
        Session {
            stream,
            peer,
            codec,
            read_chunk: read_chunk.max(1),
            exchanges: 0,
            bytes_in: 0,
            bytes_out: 0,
        }
    }

    /// Run until the peer disconnects, the codec closes, or I/O fails.
    pub async fn run(mut self) -> io::Result<SessionEnd> {
        info!(peer = %self.peer, "Connection opened");

        let result = self.exchange().await;

        match &result {
            Ok(end) => info!(
                peer = %self.peer,
                reason = ?end,
                exchanges = self.exchanges,
                bytes_in = self.bytes_in,
                bytes_out = self.bytes_out,
                "Connection closed"
            ),
            Err(e) => info!(
                peer = %self.peer,
                error = %e,
                exchanges = self.exchanges,
                "Connection closed on error"
            ),
        }

        result
    }

    async fn exchange(&mut self) -> io::Result<SessionEnd> {
        let mut buf = vec![0u8; self.read_chunk];

        loop {
            let n = self.stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(SessionEnd::PeerClosed);
            }

            self.bytes_in += n as u64;
            debug!(peer = %self.peer, len = n, "Received");
            trace!(peer = %self.peer, data = ?&buf[..n.min(64)], "Request bytes");

            let frames = match self.codec.respond(&buf[..n]) {
                Outcome::Reply(frames) => frames,
                Outcome::Close => return Ok(SessionEnd::CodecClosed),
            };

            let mut written = 0;
            for frame in &frames {
                self.stream.write_all(frame).await?;
                written += frame.len();
            }
            self.stream.flush().await?;

            self.exchanges += 1;
            self.bytes_out += written as u64;
            debug!(peer = %self.peer, frames = frames.len(), len = written, "Sent");
        }
    }
}
