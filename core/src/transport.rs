//! Transport-level decoding of request bodies.
//!
//! Relays may compress envelopes before sending them upstream. The encoding is
//! announced in the `Content-Encoding` header; this module undoes it and checks
//! that the payload is declared with the envelope media type.

use std::{borrow::Cow, io, io::Read};

use flate2::read::{GzDecoder, ZlibDecoder};
use thiserror::Error;

/// Media type of a serialized envelope.
pub const ENVELOPE_CONTENT_TYPE: &str = "application/x-sentry-envelope";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("failed to decode {encoding} body: {source}")]
    Decompression {
        encoding: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Content encodings understood by the mock upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// Parses a `Content-Encoding` header value. A missing or empty header means identity.
    pub fn parse(header: Option<&str>) -> Result<ContentEncoding, TransportError> {
        let value = header.map(str::trim).unwrap_or_default();
        if value.is_empty() || value.eq_ignore_ascii_case("identity") {
            Ok(ContentEncoding::Identity)
        } else if value.eq_ignore_ascii_case("gzip") {
            Ok(ContentEncoding::Gzip)
        } else if value.eq_ignore_ascii_case("deflate") {
            Ok(ContentEncoding::Deflate)
        } else {
            Err(TransportError::UnsupportedEncoding(value.to_owned()))
        }
    }
}

/// Decodes `body` according to the `Content-Encoding` header.
///
/// Uncompressed bodies are returned without copying.
pub fn decode_body<'a>(
    content_encoding: Option<&str>,
    body: &'a [u8],
) -> Result<Cow<'a, [u8]>, TransportError> {
    let mut decoded = Vec::new();
    match ContentEncoding::parse(content_encoding)? {
        ContentEncoding::Identity => return Ok(Cow::Borrowed(body)),
        ContentEncoding::Gzip => GzDecoder::new(body)
            .read_to_end(&mut decoded)
            .map_err(|source| TransportError::Decompression {
                encoding: "gzip",
                source,
            })?,
        ContentEncoding::Deflate => ZlibDecoder::new(body)
            .read_to_end(&mut decoded)
            .map_err(|source| TransportError::Decompression {
                encoding: "deflate",
                source,
            })?,
    };
    Ok(Cow::Owned(decoded))
}

/// Returns `true` if the `Content-Type` header declares an envelope.
///
/// Media type parameters such as `charset` are ignored.
pub fn is_envelope_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case(ENVELOPE_CONTENT_TYPE))
        .unwrap_or(false)
}
