//! OP_REPLY responder.

use super::bson::DocumentBuilder;
use super::header::{MsgHeader, HEADER_LEN, OP_REPLY};
use crate::protocols::{Codec, Outcome};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, trace};

/// Response id stamped on every reply.
const RESPONSE_ID: i32 = 12345;

/// Reply fields between the header and the document:
/// flags (4) + cursor id (8) + starting from (4) + number returned (4).
const REPLY_FIELDS_LEN: usize = 20;

/// Largest document a real server would accept (16 MiB).
const MAX_BSON_OBJECT_SIZE: i32 = 16 * 1024 * 1024;

/// Answers every MongoDB message with the same `isMaster` reply.
pub struct MongoCodec {
    document: Bytes,
    /// Body bytes announced by the last header that have not arrived yet.
    pending_body: usize,
}

impl MongoCodec {
    pub fn new() -> Self {
        MongoCodec {
            document: DocumentBuilder::new()
                .boolean("ismaster", true)
                .int32("maxBsonObjectSize", MAX_BSON_OBJECT_SIZE)
                .string("version", "mock")
                .finish(),
            pending_body: 0,
        }
    }

    /// Build the reply to the message with `request_id`.
    fn reply(&self, request_id: i32) -> Bytes {
        let total = HEADER_LEN + REPLY_FIELDS_LEN + self.document.len();
        let mut buf = BytesMut::with_capacity(total);

        MsgHeader {
            message_length: total as i32,
            request_id: RESPONSE_ID,
            response_to: request_id,
            op_code: OP_REPLY,
        }
        .encode_into(&mut buf);

        buf.put_i32_le(0); // response flags
        buf.put_i64_le(0); // cursor id
        buf.put_i32_le(0); // starting from
        buf.put_i32_le(1); // number returned
        buf.put_slice(&self.document);

        buf.freeze()
    }

    /// Drop the start of `request` that still belongs to an earlier body.
    fn skip_pending<'a>(&mut self, request: &'a [u8]) -> &'a [u8] {
        let skip = self.pending_body.min(request.len());
        if skip > 0 {
            self.pending_body -= skip;
            trace!(skip, remaining = self.pending_body, "Skipping rest of MongoDB body");
        }
        &request[skip..]
    }
}

impl Default for MongoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec for MongoCodec {
    fn respond(&mut self, request: &[u8]) -> Outcome {
        let mut rest = self.skip_pending(request);
        let mut frames = Vec::new();

        // One reply per whole header in this read
        while !rest.is_empty() {
            let header = match MsgHeader::parse(rest) {
                Some(header) => header,
                None if frames.is_empty() => {
                    debug!(len = rest.len(), "Short MongoDB header, closing");
                    return Outcome::Close;
                }
                None => {
                    debug!(extra = rest.len(), "Ignoring partial header after MongoDB messages");
                    break;
                }
            };

            debug!(
                len = header.message_length,
                request_id = header.request_id,
                op_code = header.op_code,
                "MongoDB message"
            );

            let available = rest.len() - HEADER_LEN;
            let wanted = header.body_len();
            let taken = wanted.min(available);
            if wanted > available {
                self.pending_body = wanted - available;
                debug!(wanted, available, "MongoDB body continues in a later read");
            }
            trace!(body = ?&rest[HEADER_LEN..HEADER_LEN + taken.min(50)], "MongoDB body");

            frames.push(self.reply(header.request_id));
            rest = &rest[HEADER_LEN + taken..];
        }

        Outcome::Reply(frames)
    }
}
