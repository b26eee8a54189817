//! Error types for keyglow

use thiserror::Error;

/// Result type alias for keyglow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in keyglow
#[derive(Debug, Error)]
pub enum Error {
    /// Play or export was requested before a performance was loaded
    #[error("No performance loaded: select a MIDI file first")]
    InputMissing,

    /// The audio engine refused to start
    #[error("Audio activation failed: {0}")]
    Activation(String),

    /// Capturing a frame failed during export
    #[error("Frame capture failed: {0}")]
    Capture(String),

    /// The decoded performance has an unusable structure
    #[error("Malformed performance: {0}")]
    MalformedPerformance(String),

    /// Keyboard dimensions or octave range are out of bounds
    #[error("Invalid keyboard geometry: {0}")]
    InvalidGeometry(String),

    /// Export parameters are out of bounds
    #[error("Invalid export settings: {0}")]
    InvalidExport(String),

    /// MIDI file could not be decoded
    #[error("MIDI error: {0}")]
    Midi(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// JSON performance parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<midly::Error> for Error {
    fn from(err: midly::Error) -> Self {
        Error::Midi(err.to_string())
    }
}
