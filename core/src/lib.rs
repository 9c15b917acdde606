//! Core building blocks for the mini-sentry mock upstream.
//!
//! This crate holds the pieces that do not depend on server state:
//!
//! - **envelope**: parsing and serializing event envelopes (header line plus items)
//! - **transport**: undoing `Content-Encoding` and checking the envelope media type
//! - **error_code**: the fixed table of error codes every mock error maps onto
//!
//! Everything here is synchronous and allocation-light so it can be called
//! directly from request handlers.

pub mod envelope;
pub mod error_code;
pub mod transport;

pub use envelope::{Envelope, EnvelopeError, Item};
pub use error_code::ErrorCode;
pub use transport::{TransportError, ENVELOPE_CONTENT_TYPE};
