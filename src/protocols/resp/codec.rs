//! Canned replies to Redis commands.

use super::parser::{parse, Frame, ParseResult, Reply};
use crate::protocols::{Codec, Outcome};
use bytes::Bytes;
use std::borrow::Cow;
use tracing::debug;

/// Payload of the INFO reply.
const INFO_SERVER: &str = "# Server\r\n\
    redis_version:7.0.0\r\n\
    redis_git_sha1:00000000\r\n\
    redis_git_dirty:0\r\n\
    redis_build_id:12345\r\n\
    redis_mode:standalone\r\n\
    os:Linux 5.4.0\r\n\
    arch_bits:64\r\n\
    \r\n";

const AUTH_ERROR: &str =
    "ERR AUTH <password> called without any password configured for the default user";

const UNKNOWN_ERROR: &str = "ERR unknown command";

/// Recognized command verbs, matched by case-insensitive prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Ping,
    Info,
    Echo,
    Get,
    Set,
    Auth,
}

impl Verb {
    const ALL: [(&'static [u8], Verb); 6] = [
        (b"PING", Verb::Ping),
        (b"INFO", Verb::Info),
        (b"ECHO", Verb::Echo),
        (b"GET", Verb::Get),
        (b"SET", Verb::Set),
        (b"AUTH", Verb::Auth),
    ];

    fn match_prefix(line: &[u8]) -> Option<(Verb, &[u8])> {
        Self::ALL.iter().find_map(|(name, verb)| {
            let head = line.get(..name.len())?;
            head.eq_ignore_ascii_case(name)
                .then(|| (*verb, &line[name.len()..]))
        })
    }
}

/// Stateless responder for the Redis decoy.
pub struct RespCodec;

impl RespCodec {
    pub fn new() -> Self {
        RespCodec
    }

    /// Reply for one command buffer.
    pub fn reply(request: &[u8]) -> Reply {
        let line = command_line(request);
        let line = line.trim_ascii();

        match Verb::match_prefix(line) {
            Some((Verb::Ping, _)) => Reply::Simple("PONG"),
            Some((Verb::Info, _)) => Reply::bulk(Bytes::from_static(INFO_SERVER.as_bytes())),
            Some((Verb::Echo, rest)) => Reply::bulk(Bytes::copy_from_slice(rest.trim_ascii())),
            Some((Verb::Get, _)) => Reply::null(),
            Some((Verb::Set, _)) => Reply::Simple("OK"),
            Some((Verb::Auth, _)) => Reply::Error(AUTH_ERROR),
            None => {
                debug!(command = %String::from_utf8_lossy(first_word(line)), "Unknown Redis command");
                Reply::Error(UNKNOWN_ERROR)
            }
        }
    }
}

impl Default for RespCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for RespCodec {
    fn respond(&mut self, request: &[u8]) -> Outcome {
        let reply = Self::reply(request);
        debug!(len = request.len(), reply = ?reply, "Redis command");
        Outcome::single(reply.encode())
    }
}

/// Flatten the request into an inline command line.
///
/// Arrays of bulk strings, as sent by real clients, are joined with
/// spaces. Anything else is used as-is.
fn command_line(request: &[u8]) -> Cow<'_, [u8]> {
    if request.first() != Some(&b'*') {
        return Cow::Borrowed(request);
    }

    match parse(request) {
        ParseResult::Complete(Frame::Array(Some(frames)), _) => {
            let words: Option<Vec<Bytes>> = frames
                .into_iter()
                .map(|frame| match frame {
                    Frame::Bulk(Some(data)) => Some(data),
                    Frame::Simple(s) => Some(Bytes::from(s)),
                    Frame::Integer(n) => Some(Bytes::from(n.to_string())),
                    _ => None,
                })
                .collect();

            match words {
                Some(words) => Cow::Owned(words.join(&b' ')),
                None => Cow::Borrowed(request),
            }
        }
        _ => Cow::Borrowed(request),
    }
}

fn first_word(line: &[u8]) -> &[u8] {
    line.split(|b| b.is_ascii_whitespace()).next().unwrap_or(line)
}
