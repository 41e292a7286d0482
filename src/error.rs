//! Error handling for Chirpscope
//!
//! Failures are local to one player. Nothing here is fatal to the page
//! hosting the players; see `is_recoverable`.

use thiserror::Error;

/// Result type alias for Chirpscope operations
pub type Result<T> = std::result::Result<T, ChirpError>;

/// Main error type for Chirpscope operations
#[derive(Error, Debug)]
pub enum ChirpError {
    // Processing Errors
    #[error("Real-time audio processing is unavailable on this host")]
    GraphUnavailable,

    // Source Errors
    #[error("Failed to load audio source: {reason}")]
    SourceLoadFailed { reason: String },

    #[error("Failed to decode audio source: {reason}")]
    SourceDecodeFailed { reason: String },

    #[error("Playback start rejected: {reason}")]
    StartRejected { reason: String },

    #[error("Invalid audio source: {reason}")]
    InvalidSource { reason: String },

    // Coordination Errors
    #[error("Stale exclusivity token released (serial {serial})")]
    StaleTokenRelease { serial: u64 },

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
}

impl ChirpError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            ChirpError::GraphUnavailable => "GRAPH_UNAVAILABLE",
            ChirpError::SourceLoadFailed { .. } => "SOURCE_LOAD_FAILED",
            ChirpError::SourceDecodeFailed { .. } => "SOURCE_DECODE_FAILED",
            ChirpError::StartRejected { .. } => "START_REJECTED",
            ChirpError::InvalidSource { .. } => "INVALID_SOURCE",
            ChirpError::StaleTokenRelease { .. } => "STALE_TOKEN_RELEASE",
            ChirpError::Config { .. } => "CONFIG_ERROR",
            ChirpError::Io(_) => "IO_ERROR",
            ChirpError::Json(_) => "SERIALIZATION_ERROR",
            ChirpError::Wav(_) => "WAV_ERROR",
        }
    }

    /// Check if the player can keep going after this error
    ///
    /// Source failures return the player to `Idle` and a retry is allowed,
    /// so they count as recoverable too.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChirpError::GraphUnavailable
                | ChirpError::SourceLoadFailed { .. }
                | ChirpError::SourceDecodeFailed { .. }
                | ChirpError::StartRejected { .. }
                | ChirpError::StaleTokenRelease { .. }
        )
    }

    /// Whether the reviewer should be told about this error at all
    pub fn is_user_visible(&self) -> bool {
        !matches!(
            self,
            ChirpError::GraphUnavailable | ChirpError::StaleTokenRelease { .. }
        )
    }
}
