//! MongoDB wire protocol decoy.
//!
//! Every message starts with a 16-byte little-endian header:
//!
//! ```text
//! ┌────────────┬────────────┬────────────┬────────────┐
//! │ length (4) │ reqId (4)  │ respTo (4) │ opCode (4) │
//! └────────────┴────────────┴────────────┴────────────┘
//! ```
//!
//! Whatever the client asks, the decoy answers with an OP_REPLY carrying a
//! single `isMaster`-style document. The request id is echoed in the reply's
//! `responseTo` field so drivers and scanners accept it as the answer to
//! their message.

pub mod bson;
pub mod codec;
pub mod header;

pub use codec::MongoCodec;
pub use header::{MsgHeader, HEADER_LEN};
