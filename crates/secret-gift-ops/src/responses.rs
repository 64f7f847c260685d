//! Response DTOs for operations.
//!
//! Responses never carry the full assignment: a giver only ever learns their
//! own recipient through [`RevealResponse`].

use std::path::PathBuf;

use secret_gift_core::Participant;
use serde::{Deserialize, Serialize};

use crate::requests::RuleKind;
use crate::store::Manifest;

/// Response from an init operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResponse {
    /// Root of the exchange.
    pub path: PathBuf,

    /// Whether a new exchange was written (false when one already existed).
    pub created: bool,
}

/// Response from adding, renaming or removing participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsResponse {
    /// Participants affected by the operation.
    pub changed: Vec<Participant>,

    /// Participant list after the operation.
    pub participants: Vec<Participant>,
}

/// Response from adding or removing a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResponse {
    /// Restriction or mandate.
    pub kind: RuleKind,

    /// Who gives.
    pub giver: Participant,

    /// Who receives.
    pub receiver: Participant,

    /// Whether the rule set changed.
    pub changed: bool,
}

/// Response from setup or a reshuffle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleResponse {
    /// Number of participants in the new assignment.
    pub participants: usize,

    /// Number of assignments generated so far.
    pub generation: u64,
}

/// Response from a face registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    /// Participant whose face was stored.
    pub name: Participant,

    /// Number of registered faces after the operation.
    pub registered_faces: usize,
}

/// Response from a verified reveal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealResponse {
    /// Verified giver.
    pub name: Participant,

    /// Who they give to.
    pub recipient: Participant,
}

/// Per-participant line of a status report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantStatus {
    /// Participant name.
    pub name: Participant,

    /// Receivers this participant may not draw.
    pub restrictions: Vec<Participant>,

    /// Receiver this participant must draw.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mandate: Option<Participant>,

    /// Whether a face is registered.
    pub registered: bool,

    /// Whether they verified against the current assignment.
    pub verified: bool,
}

/// Response from a status operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Root of the exchange.
    pub path: PathBuf,

    /// Whether setup was completed.
    pub setup_complete: bool,

    /// Whether an assignment is committed.
    pub has_assignment: bool,

    /// Number of assignments generated so far.
    pub generation: u64,

    /// Number of restrictions plus mandates.
    pub rule_count: usize,

    /// Participants in insertion order.
    pub participants: Vec<ParticipantStatus>,

    /// Manifest of the last save.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<Manifest>,

    /// Number of face-data backups.
    pub backup_count: usize,

    /// Total size of the .gift directory.
    pub store_size: u64,
}

impl StatusResponse {
    /// Number of participants with a registered face.
    pub fn registered_count(&self) -> usize {
        self.participants.iter().filter(|p| p.registered).count()
    }

    /// Number of participants verified against the current assignment.
    pub fn verified_count(&self) -> usize {
        self.participants.iter().filter(|p| p.verified).count()
    }
}

/// Response from a face-data export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    /// Backup file written.
    pub path: PathBuf,

    /// Number of faces exported.
    pub faces: usize,
}

/// Response from a face-data import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    /// Backup file read.
    pub path: PathBuf,

    /// Number of faces kept.
    pub imported: usize,

    /// Names in the backup that are not participants.
    pub dropped: Vec<Participant>,
}
