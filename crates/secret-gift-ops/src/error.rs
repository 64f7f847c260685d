//! Error types for the operations layer.

use std::path::PathBuf;

use secret_gift_core::{GiftError, Participant};
use thiserror::Error;

/// Result type for operations.
pub type OpsResult<T> = Result<T, OpsError>;

/// Errors that can occur during operations.
#[derive(Debug, Error)]
pub enum OpsError {
    /// Rule, generation or session error from the engine.
    #[error(transparent)]
    Gift(#[from] GiftError),

    /// The claimed participant never registered a face.
    #[error("No face registered for {name}. Please register first.")]
    NotRegistered { name: Participant },

    /// The probe face matched nobody.
    #[error("Face not recognized. Please try again or register first.")]
    NotRecognized,

    /// The probe face belongs to someone other than the claimed participant.
    #[error("This looks like {actual}, not {claimed}! Please select your correct name.")]
    IdentityMismatch {
        claimed: Participant,
        actual: Participant,
    },

    /// The matcher could not find a face in the supplied image.
    #[error("No face detected in the image")]
    NoFaceDetected,

    /// The exchange is still being set up.
    #[error("Setup is not complete ({participants} participant(s), at least {minimum} required)")]
    SetupIncomplete { participants: usize, minimum: usize },

    /// The .gift store doesn't exist (need to init first).
    #[error("No .gift folder found at {path}. Run `sg init` first.")]
    StoreNotFound { path: PathBuf },

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OpsError {
    /// The engine error underneath, if any.
    pub fn as_gift(&self) -> Option<&GiftError> {
        match self {
            OpsError::Gift(err) => Some(err),
            _ => None,
        }
    }
}
