//! Fixed table of error codes shared by every mini-sentry error type.
//!
//! Each code has a stable numeric value, a CamelCase name used when reporting
//! failures, and a constant-style name matching the `MINI_SENTRY_ERROR_CODE_*`
//! naming used by external bindings. The table is generated at compile time by
//! [`error_codes!`], so adding a code means adding exactly one line below.

use std::fmt;

use serde::{Serialize, Serializer};

macro_rules! error_codes {
    ($($(#[$meta:meta])* $name:ident = $code:literal => $constant:literal;)*) => {
        /// Stable error codes reported by the mock upstream.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum ErrorCode {
            $($(#[$meta])* $name = $code,)*
        }

        impl ErrorCode {
            /// Every known code, in table order.
            pub const ALL: &'static [ErrorCode] = &[$(ErrorCode::$name,)*];

            /// Looks up a code by its numeric value.
            pub fn from_code(code: u32) -> Option<ErrorCode> {
                match code {
                    $($code => Some(ErrorCode::$name),)*
                    _ => None,
                }
            }

            /// The CamelCase name of the code, e.g. `UnknownRelay`.
            pub fn name(self) -> &'static str {
                match self {
                    $(ErrorCode::$name => stringify!($name),)*
                }
            }

            /// The constant name of the code, e.g. `MINI_SENTRY_ERROR_CODE_UNKNOWN_RELAY`.
            pub fn constant_name(self) -> &'static str {
                match self {
                    $(ErrorCode::$name => concat!("MINI_SENTRY_ERROR_CODE_", $constant),)*
                }
            }
        }
    };
}

error_codes! {
    NoError = 0 => "NO_ERROR";
    Panic = 1 => "PANIC";
    Unknown = 2 => "UNKNOWN";

    // registration and authentication
    /// A relay that is not in the registry asked for a challenge.
    UnknownRelay = 1001 => "UNKNOWN_RELAY";
    /// The relay id header disagrees with the relay id in the body.
    ProtocolMismatch = 1002 => "PROTOCOL_MISMATCH";
    /// A relay that never completed registration asked for configs or keys.
    Unregistered = 1003 => "UNREGISTERED";

    // event ingestion
    BadTransport = 2001 => "BAD_TRANSPORT";
    UnexpectedContentType = 2002 => "UNEXPECTED_CONTENT_TYPE";
    UnknownProject = 2003 => "UNKNOWN_PROJECT";
    InvalidEnvelope = 2004 => "INVALID_ENVELOPE";
    /// An event was sent to the internal error project.
    InternalErrorEvent = 2005 => "INTERNAL_ERROR_EVENT";

    // request parsing
    InvalidRequest = 3001 => "INVALID_REQUEST";
}

impl ErrorCode {
    /// The numeric value of the code.
    pub fn code(self) -> u32 {
        self as u32
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}
