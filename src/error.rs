//! Error types for gipstore.

use thiserror::Error;

use crate::serial::TypeTag;

/// Error type for gipstore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A type tag was registered twice
    #[error("type already registered: {0}")]
    DuplicateType(TypeTag),

    /// A type tag is not present in the registry
    #[error("unknown type: {0}")]
    UnknownType(TypeTag),

    /// A back-reference names an id that was never assigned in this session
    #[error("unresolved reference id: {0}")]
    UnresolvedReference(u32),

    /// String length failed its check byte or is negative
    #[error("corrupt string: length {length}, check byte {checksum:#04x}")]
    CorruptString { length: i32, checksum: u8 },

    /// A record body consumed more bytes than its frame declared
    #[error("record {tag} overran its frame: declared {declared} bytes, consumed {consumed}")]
    OversizedRecord {
        tag: TypeTag,
        declared: u32,
        consumed: u64,
    },

    /// Stream does not start with the expected magic value
    #[error("invalid stream magic: {0:#010x}")]
    InvalidStream(u32),

    /// A reference resolved to a different type than the caller expected
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: TypeTag, found: TypeTag },

    /// String payload is not valid UTF-8 / UTF-16
    #[error("invalid text: {0}")]
    InvalidText(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid IP address in a dataset row or query
    #[error("invalid IP address: {0}")]
    InvalidAddress(String),

    /// Invalid latitude / longitude text
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Global database not initialized
    #[error("database not initialized")]
    NotInitialized,
}

/// Result type alias for gipstore operations.
pub type Result<T> = std::result::Result<T, Error>;
