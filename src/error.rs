// Error types for the babeld monitor protocol client

use thiserror::Error;

/// Everything that can go wrong inside one monitor session. All variants
/// are fatal to that session only; other routers' sessions are unaffected.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unterminated string")]
    UnterminatedString,

    #[error("syntax error: '{0}' must be a boolean")]
    BadBool(String),

    #[error("syntax error: '{word}' is not a valid number: {source}")]
    BadNumber {
        word: String,
        source: std::num::ParseIntError,
    },

    #[error("syntax error: number out of range: {0}")]
    NumberRange(String),

    #[error("syntax error: invalid IP address: {0}")]
    BadAddress(String),

    #[error("syntax error: invalid prefix: {0}")]
    BadPrefix(String),

    #[error("field already exists")]
    FieldPresence,

    #[error("no such field")]
    FieldAbsence,

    #[error("unknown table kind: {0}")]
    UnknownTable(String),

    #[error("BABEL 0.0: unsupported version")]
    UnsupportedVersion,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("update channel closed")]
    SinkClosed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for monitor sessions
pub type Result<T> = std::result::Result<T, Error>;
