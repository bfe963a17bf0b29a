//! Library error types.

use std::fmt;

use serde::{de, ser};

use crate::value::Value;

/// A smile-pack Result, normally returning a smile-pack [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A smile-pack error. Encompasses anything that can go wrong while encoding
/// or decoding a SMILE document.
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The encoder was handed input it cannot represent, or its token methods
    /// were called in an order that doesn't form a valid document.
    BadEncode(String),
    /// The 4-byte document header was missing, truncated, or malformed.
    BadHeader(String),
    /// The byte stream ended in the middle of a token.
    LengthTooShort {
        /// What step of the decoding we were on when it failed.
        step: &'static str,
        /// How many bytes were left
        actual: usize,
        /// How many bytes the step needed
        expected: usize,
    },
    /// A token byte from a reserved range appeared in the given context.
    ReservedToken {
        /// "value" or "key"
        context: &'static str,
        /// The offending byte
        byte: u8,
    },
    /// A shared-string back-reference pointed at or past the end of its table.
    BadBackRef {
        /// Which table the reference named
        table: &'static str,
        /// The referenced index
        index: usize,
        /// Number of entries currently in the table
        len: usize,
    },
    /// A token was used that requires a header feature bit the stream did not
    /// declare.
    MissingFeature(&'static str),
    /// A recognized token range this implementation does not decode
    /// (BigInteger and BigDecimal payloads).
    Unsupported(&'static str),
    /// Nesting depth or another parsing limit was exceeded.
    ParseLimit(String),
    /// Any other byte-stream violation.
    BadDecode(String),
    /// Serde serialization or deserialization failed.
    SerdeFail(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::BadEncode(ref err) => write!(f, "Encoding failure: {}", err),
            Error::BadHeader(ref err) => write!(f, "Data has bad header: {}", err),
            Error::LengthTooShort {
                step,
                actual,
                expected,
            } => write!(
                f,
                "Expected {} more byte(s), but had {} on step [{}]",
                expected, actual, step
            ),
            Error::ReservedToken { context, byte } => write!(
                f,
                "Reserved token byte 0x{:02X} in {} context",
                byte, context
            ),
            Error::BadBackRef { table, index, len } => write!(
                f,
                "Back-reference {} into the {} table, which holds {} entries",
                index, table, len
            ),
            Error::MissingFeature(feature) => write!(
                f,
                "Stream uses {}, but the header did not enable it",
                feature
            ),
            Error::Unsupported(what) => write!(f, "Token type not supported: {}", what),
            Error::ParseLimit(ref err) => write!(f, "Hit parsing limit: {}", err),
            Error::BadDecode(ref err) => write!(f, "Bad data encoding: {}", err),
            Error::SerdeFail(ref msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for Error {}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::SerdeFail(msg.to_string())
    }
}

/// Error returned by the top-level decode functions.
///
/// Alongside the underlying [`Error`], this carries whatever portion of the
/// value tree had been assembled before the failure, with any still-open
/// containers closed off. The partial value is diagnostic only; it is not a
/// faithful decode of anything.
#[derive(Clone, Debug)]
pub struct DecodeError {
    /// What went wrong.
    pub error: Error,
    /// The value prefix assembled before the failure, if any.
    pub partial: Option<Value>,
}

impl DecodeError {
    pub(crate) fn new(error: Error, partial: Option<Value>) -> Self {
        DecodeError { error, partial }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<Error> for DecodeError {
    fn from(error: Error) -> Self {
        DecodeError {
            error,
            partial: None,
        }
    }
}
