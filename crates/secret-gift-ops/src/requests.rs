//! Request DTOs for operations.
//!
//! Each request type carries the parameters of one operation, so the CLI and
//! any other host drive the exchange the same way.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::matcher::{FaceEncoding, FaceMatcher};

/// Which kind of pairing rule a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Forbidden pairing.
    Restriction,
    /// Required pairing.
    Mandate,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Restriction => write!(f, "restriction"),
            RuleKind::Mandate => write!(f, "mandate"),
        }
    }
}

/// Request to add or remove a pairing rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    /// Restriction or mandate.
    pub kind: RuleKind,

    /// Who gives.
    pub giver: String,

    /// Who receives.
    pub receiver: String,
}

impl RuleRequest {
    /// A restriction `giver ↛ receiver`.
    pub fn restriction(giver: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Restriction,
            giver: giver.into(),
            receiver: receiver.into(),
        }
    }

    /// A mandate `giver → receiver`.
    pub fn mandate(giver: impl Into<String>, receiver: impl Into<String>) -> Self {
        Self {
            kind: RuleKind::Mandate,
            giver: giver.into(),
            receiver: receiver.into(),
        }
    }
}

/// A face supplied to registration or verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaceInput {
    /// Already-encoded feature vector.
    Encoding(FaceEncoding),
    /// Raw image bytes, encoded by the configured matcher.
    Image(Vec<u8>),
}

impl FaceInput {
    /// Resolve to an encoding. `None` when the matcher finds no face.
    pub fn encode(&self, matcher: &dyn FaceMatcher) -> Option<FaceEncoding> {
        match self {
            FaceInput::Encoding(encoding) => Some(encoding.clone()),
            FaceInput::Image(bytes) => matcher.detect_and_encode(bytes),
        }
    }
}

/// Request to store a participant's face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    /// Participant the face belongs to.
    pub name: String,

    /// The face to store.
    pub face: FaceInput,
}

impl RegisterRequest {
    /// Register from raw image bytes.
    pub fn image(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            face: FaceInput::Image(bytes),
        }
    }
}

/// Request to verify a participant and reveal their recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealRequest {
    /// The name the caller claims.
    pub name: String,

    /// Probe face captured for this attempt.
    pub probe: FaceInput,
}

impl RevealRequest {
    /// Reveal using raw image bytes as the probe.
    pub fn image(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            probe: FaceInput::Image(bytes),
        }
    }
}
