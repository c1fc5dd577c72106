//! Error types for the greeting pipeline.

use thiserror::Error;

/// Result type used throughout the core crate.
pub type Result<T> = std::result::Result<T, GreetError>;

/// Errors that can occur while generating a greeting.
#[derive(Debug, Error)]
pub enum GreetError {
    /// Media bytes could not be decoded.
    #[error("decode failed: {0}")]
    Decode(String),

    /// No usable text after trimming, segmentation and chunking.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// The TTS collaborator failed.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// A referenced record or file does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Nothing to concatenate.
    #[error("no segments to assemble")]
    EmptyAssembly,

    /// The external encoder (ffmpeg/ffprobe) failed.
    #[error("encode failed: {message}")]
    Encode {
        message: String,
        stderr: Option<String>,
    },

    /// An external collaborator exceeded its deadline.
    #[error("{what} timed out after {secs} seconds")]
    Timeout { what: String, secs: u64 },

    /// Two audio tracks handed to a mix had different shapes.
    #[error("track mismatch: {0}")]
    TrackMismatch(String),

    /// A file name failed validation.
    #[error("invalid file name '{0}'")]
    InvalidName(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GreetError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn encode(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Encode {
            message: message.into(),
            stderr,
        }
    }

    /// Whether retrying the failed call might succeed.
    ///
    /// Collaborator failures (model inference, encoder, deadlines) are
    /// transient; malformed input and missing records are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Synthesis(_) | Self::Encode { .. } | Self::Timeout { .. }
        )
    }
}

impl From<hound::Error> for GreetError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Self::Io(io),
            other => Self::Decode(other.to_string()),
        }
    }
}

/// Failure inside the best-effort enhancement chain.
///
/// Never propagated past the synthesis pipeline: callers fall back to the
/// unenhanced buffer and log the cause.
#[derive(Debug, Error, PartialEq)]
pub enum EnhanceError {
    #[error("buffer is empty")]
    Empty,

    #[error("buffer contains non-finite samples")]
    NonFinite,
}
