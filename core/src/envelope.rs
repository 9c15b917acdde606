//! Envelope codec.
//!
//! An envelope is a newline-delimited container: a JSON header line followed by
//! any number of items. Every item is a JSON header line followed by a payload.
//! When the item header carries `length`, the payload is exactly that many bytes;
//! otherwise it runs until the next newline or the end of the buffer.
//!
//! ```text
//! {"event_id":"9ec79c33ec9942ab8353589fcb2e04dc"}
//! {"type":"event","length":41}
//! {"message":"hello world","level":"error"}
//! {"type":"attachment"}
//! raw payload without length
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// Item type of an event payload.
pub const ITEM_TYPE_EVENT: &str = "event";

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("envelope is empty")]
    Empty,

    #[error("invalid envelope header: {0}")]
    InvalidHeader(#[source] serde_json::Error),

    #[error("invalid header of item {index}: {source}")]
    InvalidItemHeader {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("item {0} is missing its type")]
    MissingItemType(usize),

    #[error("item {index} declares {expected} payload bytes but only {available} remain")]
    UnexpectedEof {
        index: usize,
        expected: usize,
        available: usize,
    },
}

/// A single item inside an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    headers: Map<String, Value>,
    payload: Vec<u8>,
}

impl Item {
    /// Creates an item of the given type. The `length` header is filled in on serialization.
    pub fn new(ty: &str, payload: impl Into<Vec<u8>>) -> Item {
        let mut headers = Map::new();
        headers.insert("type".to_owned(), Value::String(ty.to_owned()));
        Item {
            headers,
            payload: payload.into(),
        }
    }

    pub fn ty(&self) -> &str {
        self.headers
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(name)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Parses the payload as JSON.
    pub fn payload_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// A decoded envelope: header plus ordered items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    headers: Map<String, Value>,
    items: Vec<Item>,
}

impl Envelope {
    pub fn new() -> Envelope {
        Envelope::default()
    }

    /// Creates an envelope whose header carries `event_id`.
    pub fn with_event_id(event_id: &str) -> Envelope {
        let mut envelope = Envelope::new();
        envelope
            .headers
            .insert("event_id".to_owned(), Value::String(event_id.to_owned()));
        envelope
    }

    pub fn headers(&self) -> &Map<String, Value> {
        &self.headers
    }

    pub fn event_id(&self) -> Option<&str> {
        self.headers.get("event_id").and_then(Value::as_str)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn add_item(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn items_of_type<'a>(&'a self, ty: &'a str) -> impl Iterator<Item = &'a Item> + 'a {
        self.items.iter().filter(move |item| item.ty() == ty)
    }

    /// Returns the parsed payload of the first `event` item, if any.
    pub fn get_event(&self) -> Option<Value> {
        self.items_of_type(ITEM_TYPE_EVENT)
            .next()
            .and_then(|item| item.payload_json().ok())
    }

    /// Parses an envelope from its wire representation.
    pub fn parse(bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(EnvelopeError::Empty);
        }

        let (header_line, mut rest) = split_line(bytes);
        let headers = serde_json::from_slice(header_line).map_err(EnvelopeError::InvalidHeader)?;

        let mut items = Vec::new();
        while !rest.iter().all(u8::is_ascii_whitespace) {
            let index = items.len();
            let (item_line, after_header) = split_line(rest);
            let headers: Map<String, Value> = serde_json::from_slice(item_line)
                .map_err(|source| EnvelopeError::InvalidItemHeader { index, source })?;
            if !headers.get("type").is_some_and(Value::is_string) {
                return Err(EnvelopeError::MissingItemType(index));
            }

            let (payload, after_payload) = match headers.get("length").and_then(Value::as_u64) {
                Some(length) => {
                    let length = length as usize;
                    if length > after_header.len() {
                        return Err(EnvelopeError::UnexpectedEof {
                            index,
                            expected: length,
                            available: after_header.len(),
                        });
                    }
                    let (payload, remaining) = after_header.split_at(length);
                    (payload, remaining.strip_prefix(b"\n").unwrap_or(remaining))
                }
                None => split_line(after_header),
            };

            items.push(Item {
                headers,
                payload: payload.to_vec(),
            });
            rest = after_payload;
        }

        Ok(Envelope { headers, items })
    }

    /// Serializes the envelope, writing an explicit `length` for every item.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        let mut out = serde_json::to_vec(&self.headers)?;
        out.push(b'\n');
        for item in &self.items {
            let mut headers = item.headers.clone();
            headers.insert("length".to_owned(), Value::from(item.payload.len()));
            serde_json::to_writer(&mut out, &headers)?;
            out.push(b'\n');
            out.extend_from_slice(&item.payload);
            out.push(b'\n');
        }
        Ok(out)
    }
}

/// Splits off the first line, dropping the newline.
fn split_line(bytes: &[u8]) -> (&[u8], &[u8]) {
    match bytes.iter().position(|b| *b == b'\n') {
        Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
        None => (bytes, &bytes[bytes.len()..]),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::envelope::{Envelope, EnvelopeError, Item, ITEM_TYPE_EVENT};

    #[test]
    fn test_parse_items_with_and_without_length() {
        let bytes = b"{\"event_id\":\"9ec79c33ec9942ab8353589fcb2e04dc\"}\n\
            {\"type\":\"event\",\"length\":19}\n\
            {\"message\":\"hi\\n!\"}\n\
            {\"type\":\"attachment\"}\n\
            raw bytes\n";
        let envelope = Envelope::parse(bytes).unwrap();

        assert_eq!(
            envelope.event_id(),
            Some("9ec79c33ec9942ab8353589fcb2e04dc")
        );
        assert_eq!(envelope.items().len(), 2);
        assert_eq!(envelope.items()[0].ty(), ITEM_TYPE_EVENT);
        assert_eq!(envelope.get_event(), Some(json!({"message": "hi\n!"})));
        assert_eq!(envelope.items()[1].ty(), "attachment");
        assert_eq!(envelope.items()[1].payload(), b"raw bytes");
    }

    #[test]
    fn test_parse_without_trailing_newline() {
        let envelope = Envelope::parse(b"{}\n{\"type\":\"event\",\"length\":2}\n{}").unwrap();
        assert_eq!(envelope.event_id(), None);
        assert_eq!(envelope.items().len(), 1);
        assert_eq!(envelope.items()[0].payload(), b"{}");
    }

    #[test]
    fn test_header_only() {
        let envelope = Envelope::parse(b"{\"event_id\":\"abc\"}\n").unwrap();
        assert!(envelope.items().is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Envelope::parse(b""), Err(EnvelopeError::Empty)));
        assert!(matches!(
            Envelope::parse(b"not json\n"),
            Err(EnvelopeError::InvalidHeader(_))
        ));
        assert!(matches!(
            Envelope::parse(b"{}\n{\"length\":2}\n{}\n"),
            Err(EnvelopeError::MissingItemType(0))
        ));
        assert!(matches!(
            Envelope::parse(b"{}\n{\"type\":\"event\",\"length\":50}\n{}\n"),
            Err(EnvelopeError::UnexpectedEof {
                index: 0,
                expected: 50,
                ..
            })
        ));
    }

    #[test]
    fn test_serialized_envelope_parses_back() {
        let mut envelope = Envelope::with_event_id("9ec79c33ec9942ab8353589fcb2e04dc");
        envelope.add_item(Item::new(ITEM_TYPE_EVENT, "{\"message\":\"multi\nline\"}"));
        envelope.add_item(Item::new("attachment", vec![0u8, 10, 255]));

        let bytes = envelope.to_vec().unwrap();
        let parsed = Envelope::parse(&bytes).unwrap();

        assert_eq!(parsed.event_id(), envelope.event_id());
        assert_eq!(parsed.items()[0].payload(), envelope.items()[0].payload());
        assert_eq!(parsed.items()[1].payload(), &[0u8, 10, 255]);
        assert_eq!(parsed.items()[1].header("length"), Some(&json!(3)));
    }
}
