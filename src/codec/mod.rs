mod format;
pub mod literal;

use thiserror::Error;

pub use format::{
    deserialize, deserialize_json, deserialize_source, serialize, DataFormat, SerializedArchive,
    FORMAT_VERSION, SOURCE_MARKER, SOURCE_TERMINATOR,
};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Data marker not found")]
    MissingMarker,

    #[error("Syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("Expected terminator after the data literal at byte {offset}")]
    MissingTerminator { offset: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Records do not match the archive shape: {0}")]
    Records(serde_json::Error),

    #[error("Data format version is not a whole number: {0}")]
    InvalidVersion(String),

    #[error("Data format version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
}
