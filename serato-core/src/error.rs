//! Error types for serato-core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Binary format error: {0}")]
    BinRw(String),

    #[error("Truncated data at offset {offset}: need {needed} bytes, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("Corrupt tag at offset {offset}: {tag:02X?} is not ASCII")]
    CorruptTag { offset: usize, tag: [u8; 4] },

    #[error("Path error: {0}")]
    Path(String),

    #[error("String encoding error: {0}")]
    StringEncoding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Unknown key: {0:?}")]
    UnknownKey(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Tag read error: {0}")]
    TagRead(String),

    #[error("XML error: {0}")]
    Xml(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<binrw::Error> for Error {
    fn from(e: binrw::Error) -> Self {
        Error::BinRw(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(e.into())
    }
}
