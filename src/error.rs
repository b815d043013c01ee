//! Error types for the sanitize → compile → relay pipeline.
//!
//! Every concern owns its own enum; [`Error`] wraps them so `?` propagates
//! naturally from the CLI down to the compiler.

use thiserror::Error;

/// Framing failures raised while building or decoding a binary blob.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The tempo does not fit the configured tempo field.
    #[error("tempo {tempo} does not fit a {width_bits}-bit tempo field (max {max})")]
    TempoOutOfRange {
        tempo: u64,
        width_bits: u32,
        max: u32,
    },

    /// More note events than the blob may carry.
    #[error("{count} note events exceed the limit of {max}")]
    TooManyNotes { count: usize, max: usize },

    #[error("blob is {len} bytes, shorter than the {needed}-byte header")]
    Truncated { len: usize, needed: usize },

    #[error("blob does not start with the ZMUSIC magic header")]
    BadMagic,

    #[error("unsupported blob format version {0}")]
    UnsupportedVersion(u8),

    #[error("unknown tempo width tag {0:#04x}")]
    UnknownTempoWidth(u8),

    /// A note byte outside the note alphabet.
    #[error("byte {byte:#04x} at offset {offset} is not a note code")]
    InvalidNote { offset: usize, byte: u8 },
}

/// Failures reported by a playback engine, or by the handle guarding it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("engine is not ready (state: {0})")]
    NotReady(&'static str),

    #[error("engine install failed: {0}")]
    InstallFailed(String),

    #[error("engine rejected payload: {0}")]
    Rejected(String),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Control messages the relay refuses to publish.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("left channel has {left} samples but right has {right}")]
    ChannelLengthMismatch { left: usize, right: usize },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Crate-wide error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("format: {0}")]
    Format(#[from] FormatError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("relay: {0}")]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("wav: {0}")]
    Wav(#[from] hound::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
