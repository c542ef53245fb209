use std::fmt;
use std::io;

use serde::{de, ser};
use thiserror::Error;

use crate::handle::TypeHandle;
use crate::type_key::TypeKey;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// Underlying stream failure.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
    /// The stream ended before a field was complete.
    #[error("Unexpected end of stream, needed {needed} more bytes")]
    UnexpectedEof { needed: u64 },
    /// A declared length was negative (other than the null sentinel) or otherwise unusable.
    #[error("Invalid declared length {0}")]
    InvalidLength(i64),
    /// A declared length exceeded the configured maximum.
    #[error("Declared length {actual} exceeds the limit of {max}")]
    LengthLimit { max: usize, actual: usize },
    /// Reserving memory for a declared length failed. Never truncated.
    #[error("Could not allocate {requested} bytes for a declared length")]
    Allocation { requested: usize },
    #[error("Invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),
    #[error("Invalid char scalar 0x{0:x}")]
    InvalidChar(u32),
    #[error("String is not valid UTF-8: {0}")]
    InvalidUtf8(#[source] std::string::FromUtf8Error),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    /// A non-nullable typed read met the null sentinel.
    #[error("Expected a value, found null")]
    NullValue,
    /// A handle with no registration in the active cache context. Fatal for the stream.
    #[error("Type handle {handle} has no registration in cache context \"{context}\"")]
    UnknownHandle { handle: TypeHandle, context: String },
    /// A value whose type has no registration was handed to the encoder.
    #[error("Type {0} has no registered surrogate")]
    Unregistered(TypeKey),
    #[error("Type {0} is already registered")]
    DuplicateType(TypeKey),
    #[error("Type handle {0} is already assigned")]
    DuplicateHandle(TypeHandle),
    #[error("Type handle {0} is reserved")]
    ReservedHandle(TypeHandle),
    #[error("No type handles left to assign")]
    HandleSpaceExhausted,
    /// A surrogate was handed a value it doesn't encode, or a lookup resolved to the wrong
    /// kind of surrogate.
    #[error("Expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("Enum {key} can't hold discriminant {value}")]
    EnumRange { key: TypeKey, value: String },
    #[error("Back-reference {0} points at no decoded object")]
    InvalidBackReference(i32),
    #[error("Back-reference {0} points at an object that was skipped")]
    SkippedReference(i32),
    #[error("{0} unread bytes after the value")]
    TrailingBytes(usize),
    #[error("Nesting depth limit of {0} exceeded")]
    DepthLimit(usize),
    /// Fallback (pack) serializer failure.
    #[error("Fallback serializer failure: {0}")]
    Pack(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn mismatch(expected: &'static str, found: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            expected,
            found: found.to_string(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::UnexpectedEof { needed: 1 }
        } else {
            Error::Io(e)
        }
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Pack(msg.to_string())
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::Pack(msg.to_string())
    }
}
