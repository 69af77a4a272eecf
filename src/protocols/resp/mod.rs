//! RESP (Redis Serialization Protocol) decoy.
//!
//! Accepts both inline commands (`PING\r\n`) and RESP arrays
//! (`*1\r\n$4\r\nPING\r\n`). No command is executed; every verb maps to a
//! fixed reply and nothing is remembered between commands.
//!
//! ```text
//! PING  -> +PONG
//! INFO  -> $<len> # Server section
//! ECHO  -> $<len> argument
//! GET   -> $-1
//! SET   -> +OK
//! AUTH  -> -ERR no password configured
//! other -> -ERR unknown command
//! ```

pub mod codec;
pub mod parser;

pub use codec::RespCodec;
pub use parser::{Frame, Reply};
