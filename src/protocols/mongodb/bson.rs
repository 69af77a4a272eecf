//! Minimal BSON document encoding.
//!
//! Only the element types the canned replies need are supported.

use bytes::{BufMut, Bytes, BytesMut};

const TYPE_STRING: u8 = 0x02;
const TYPE_BOOLEAN: u8 = 0x08;
const TYPE_INT32: u8 = 0x10;

/// Builds a single BSON document.
///
/// ```text
/// ┌──────────┬─────────────────────────────┬──────┐
/// │ len (4)  │ elements...                 │ 0x00 │
/// └──────────┴─────────────────────────────┴──────┘
/// element: type (1) | name (cstring) | value
/// ```
pub struct DocumentBuilder {
    elements: BytesMut,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        DocumentBuilder {
            elements: BytesMut::with_capacity(64),
        }
    }

    /// Append a boolean element.
    pub fn boolean(mut self, name: &str, value: bool) -> Self {
        self.element_header(TYPE_BOOLEAN, name);
        self.elements.put_u8(u8::from(value));
        self
    }

    /// Append an int32 element.
    pub fn int32(mut self, name: &str, value: i32) -> Self {
        self.element_header(TYPE_INT32, name);
        self.elements.put_i32_le(value);
        self
    }

    /// Append a UTF-8 string element.
    pub fn string(mut self, name: &str, value: &str) -> Self {
        self.element_header(TYPE_STRING, name);
        // Length counts the trailing NUL
        self.elements.put_i32_le(value.len() as i32 + 1);
        self.elements.put_slice(value.as_bytes());
        self.elements.put_u8(0);
        self
    }

    /// Finish the document, prefixing its total length.
    pub fn finish(self) -> Bytes {
        let total = 4 + self.elements.len() + 1;
        let mut doc = BytesMut::with_capacity(total);
        doc.put_i32_le(total as i32);
        doc.put_slice(&self.elements);
        doc.put_u8(0);
        doc.freeze()
    }

    fn element_header(&mut self, element_type: u8, name: &str) {
        self.elements.put_u8(element_type);
        self.elements.put_slice(name.as_bytes());
        self.elements.put_u8(0);
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document() {
        let doc = DocumentBuilder::new().finish();
        assert_eq!(&doc[..], &[5, 0, 0, 0, 0]);
    }

    #[test]
    fn test_boolean_element() {
        let doc = DocumentBuilder::new().boolean("ok", true).finish();
        assert_eq!(&doc[..], b"\x0a\x00\x00\x00\x08ok\x00\x01\x00");
    }

    #[test]
    fn test_int32_element() {
        let doc = DocumentBuilder::new()
            .int32("maxBsonObjectSize", 16 * 1024 * 1024)
            .finish();
        assert_eq!(
            &doc[..],
            b"\x1c\x00\x00\x00\x10maxBsonObjectSize\x00\x00\x00\x00\x01\x00"
        );
    }

    #[test]
    fn test_string_element() {
        let doc = DocumentBuilder::new().string("version", "mock").finish();
        assert_eq!(
            &doc[..],
            b"\x17\x00\x00\x00\x02version\x00\x05\x00\x00\x00mock\x00\x00"
        );
    }

    #[test]
    fn test_declared_length_matches() {
        let doc = DocumentBuilder::new()
            .boolean("ismaster", true)
            .int32("maxBsonObjectSize", 16_777_216)
            .string("version", "mock")
            .finish();

        let declared = i32::from_le_bytes([doc[0], doc[1], doc[2], doc[3]]);
        assert_eq!(declared as usize, doc.len());
        assert_eq!(doc[doc.len() - 1], 0);
    }
}
