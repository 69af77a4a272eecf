//! wire-decoys: database wire-protocol decoys
//!
//! Each decoy listens on a TCP port and answers just enough of a real
//! database protocol for scanners and clients to believe the service is
//! there:
//! - MongoDB wire protocol (`mock-mongodb`, port 27018)
//! - PostgreSQL startup handshake (`mock-postgres`, port 5433)
//! - Redis RESP protocol (`mock-redis`, port 6379)
//!
//! Nothing is stored and no query is executed. All three share one
//! listener and session loop; only the protocol codec differs.

pub mod config;
pub mod launch;
pub mod protocols;
pub mod server;
pub mod session;

pub use config::Config;
pub use launch::launch;
pub use protocols::{Codec, Outcome, ProtocolType};
pub use server::{Server, ServerError, ServerOptions};
pub use session::{Session, SessionEnd};
