//! Error types for the assignment engine.

use thiserror::Error;

use crate::participant::Participant;

/// Result type alias for engine operations.
pub type GiftResult<T> = Result<T, GiftError>;

/// Errors raised by the rule store, the generator and the session.
///
/// Rule-consistency errors are raised at the point of rule creation and leave
/// the store untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GiftError {
    /// A participant with this name already exists.
    #[error("participant already exists: {name}")]
    DuplicateParticipant { name: Participant },

    /// No participant with this name exists.
    #[error("unknown participant: {name}")]
    UnknownParticipant { name: Participant },

    /// Participant names must contain at least one non-whitespace character.
    #[error("participant name must not be empty")]
    EmptyName,

    /// A rule would make a participant give to themselves.
    #[error("{name} cannot have a rule pointing at themselves")]
    SelfReference { name: Participant },

    /// A mandate was requested for a pair that is already restricted.
    #[error("conflict: {giver} can't gift to {receiver}, cannot add mandate")]
    RestrictionConflict {
        giver: Participant,
        receiver: Participant,
    },

    /// A restriction was requested for a pair that is already mandated.
    #[error("conflict: {giver} must gift to {receiver}, cannot add restriction")]
    MandateConflict {
        giver: Participant,
        receiver: Participant,
    },

    /// The giver is already mandated to somebody else.
    #[error("{giver} already must gift to {existing}, cannot also mandate {requested}")]
    MultipleMandates {
        giver: Participant,
        existing: Participant,
        requested: Participant,
    },

    /// No permutation satisfies the current rules.
    #[error("no valid assignment exists for {participants} participant(s) under the current rules")]
    Infeasible { participants: usize },

    /// A recipient was requested before any assignment was generated.
    #[error("no assignment has been generated yet")]
    NoAssignment,

    /// A complete search was needed on a group above its ceiling.
    #[error("complete search supports at most {ceiling} participants, got {participants}")]
    TooManyParticipants { participants: usize, ceiling: usize },

    /// Restored assignment data is not a permutation of its givers.
    #[error("malformed assignment: {reason}")]
    MalformedAssignment { reason: &'static str },
}

impl GiftError {
    /// Build an [`GiftError::UnknownParticipant`] from anything name-like.
    pub fn unknown(name: impl Into<Participant>) -> Self {
        Self::UnknownParticipant { name: name.into() }
    }

    /// Whether this error describes an inconsistent rule rather than bad identity input.
    pub fn is_rule_conflict(&self) -> bool {
        matches!(
            self,
            Self::SelfReference { .. }
                | Self::RestrictionConflict { .. }
                | Self::MandateConflict { .. }
                | Self::MultipleMandates { .. }
        )
    }
}
