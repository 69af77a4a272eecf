//! PostgreSQL startup handshake decoy.
//!
//! Backend messages are a one-byte type tag followed by a big-endian
//! length that counts itself and the payload, but not the tag:
//!
//! ```text
//! ┌─────────┬────────────┬──────────────────┐
//! │ tag (1) │ length (4) │ payload          │
//! └─────────┴────────────┴──────────────────┘
//! ```
//!
//! ## Exchange
//!
//! ```text
//! client: <startup message, not parsed>
//! server: R(auth ok) K(backend key data) Z(ready, idle)
//! client: <anything>
//! server: E(error response)
//! ```

pub mod codec;
pub mod message;

pub use codec::{PostgresCodec, StartupState};
pub use message::BackendMessage;
