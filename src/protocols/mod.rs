//! Protocol codecs.
//!
//! Each emulated service is a [`Codec`] that maps the bytes of one read to
//! the canned reply a real server would send. The session loop is shared;
//! only the codec differs between decoys.
//!
//! ## Protocols
//! - `mongodb`: MongoDB wire protocol (OP_REPLY to any message)
//! - `postgres`: PostgreSQL startup handshake
//! - `resp`: Redis RESP command replies

pub mod mongodb;
pub mod postgres;
pub mod resp;

use bytes::Bytes;

/// What a codec wants the session to do with one read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Write these frames to the peer, in order. May be empty.
    Reply(Vec<Bytes>),
    /// The input cannot be answered; end the session.
    Close,
}

impl Outcome {
    /// A reply consisting of a single frame.
    pub fn single(frame: impl Into<Bytes>) -> Self {
        Outcome::Reply(vec![frame.into()])
    }
}

/// A per-connection protocol responder.
///
/// Codecs are created fresh for every accepted connection, so any state
/// they hold lives exactly as long as that connection.
pub trait Codec: Send + 'static {
    /// Answer the bytes of one read.
    fn respond(&mut self, request: &[u8]) -> Outcome;
}

/// The emulated services.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolType {
    MongoDb,
    Postgres,
    Redis,
}

impl ProtocolType {
    /// Port the decoy listens on when none is configured.
    pub fn default_port(self) -> u16 {
        match self {
            ProtocolType::MongoDb => 27018,
            ProtocolType::Postgres => 5433,
            ProtocolType::Redis => 6379,
        }
    }

    /// Short name used in log fields.
    pub fn name(self) -> &'static str {
        match self {
            ProtocolType::MongoDb => "mongodb",
            ProtocolType::Postgres => "postgres",
            ProtocolType::Redis => "redis",
        }
    }

    /// Product name of the emulated service.
    pub fn display_name(self) -> &'static str {
        match self {
            ProtocolType::MongoDb => "MongoDB",
            ProtocolType::Postgres => "PostgreSQL",
            ProtocolType::Redis => "Redis",
        }
    }

    /// Name of the executable serving this protocol.
    pub fn binary_name(self) -> &'static str {
        match self {
            ProtocolType::MongoDb => "mock-mongodb",
            ProtocolType::Postgres => "mock-postgres",
            ProtocolType::Redis => "mock-redis",
        }
    }

    /// Build a codec for a newly accepted connection.
    pub fn codec(self) -> Box<dyn Codec> {
        match self {
            ProtocolType::MongoDb => Box::new(mongodb::MongoCodec::new()),
            ProtocolType::Postgres => Box::new(postgres::PostgresCodec::new()),
            ProtocolType::Redis => Box::new(resp::RespCodec::new()),
        }
    }
}

impl std::fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
