//! The committed giver → receiver permutation.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::GiftError;
use crate::participant::Participant;
use crate::rules::RuleStore;
use crate::validator::is_valid;

/// A complete assignment: `receivers[i]` is the gift recipient of `givers[i]`.
///
/// Built only by the generator, which guarantees a fixed-point-free
/// permutation satisfying every rule at the time of generation. Deserializing
/// checks the shape again; rule checks happen in [`Assignment::satisfies`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AssignmentData", into = "AssignmentData")]
pub struct Assignment {
    givers: Vec<Participant>,
    receivers: Vec<Participant>,
}

/// Persisted form of an [`Assignment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentData {
    pub givers: Vec<Participant>,
    pub receivers: Vec<Participant>,
}

impl Assignment {
    pub(crate) fn new(givers: Vec<Participant>, receivers: Vec<Participant>) -> Self {
        debug_assert_eq!(givers.len(), receivers.len());
        Self { givers, receivers }
    }

    /// Receiver for a giver, if the giver is part of this assignment.
    pub fn recipient_of(&self, giver: &str) -> Option<&Participant> {
        self.givers
            .iter()
            .position(|g| g == giver)
            .and_then(|idx| self.receivers.get(idx))
    }

    /// Givers in participant order.
    pub fn givers(&self) -> &[Participant] {
        &self.givers
    }

    /// Receivers aligned with [`Assignment::givers`].
    pub fn receivers(&self) -> &[Participant] {
        &self.receivers
    }

    /// Iterate over (giver, receiver) pairs.
    pub fn pairs(&self) -> impl Iterator<Item = (&Participant, &Participant)> {
        self.givers.iter().zip(self.receivers.iter())
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.givers.len()
    }

    /// Whether the assignment is empty.
    pub fn is_empty(&self) -> bool {
        self.givers.is_empty()
    }

    /// Whether this assignment is still a valid permutation of `rules`' participants.
    ///
    /// Used to re-check assignments restored from persistence.
    pub fn satisfies(&self, rules: &RuleStore) -> bool {
        if self.givers.as_slice() != rules.participants() {
            return false;
        }
        let mut sorted_givers: Vec<&Participant> = self.givers.iter().collect();
        let mut sorted_receivers: Vec<&Participant> = self.receivers.iter().collect();
        sorted_givers.sort();
        sorted_receivers.sort();
        sorted_givers == sorted_receivers && is_valid(&self.givers, &self.receivers, rules)
    }

    /// Rename a participant wherever they appear.
    pub(crate) fn rename(&mut self, old: &str, new: &Participant) {
        for name in self.givers.iter_mut().chain(self.receivers.iter_mut()) {
            if *name == old {
                *name = new.clone();
            }
        }
    }
}

impl TryFrom<AssignmentData> for Assignment {
    type Error = GiftError;

    fn try_from(data: AssignmentData) -> Result<Self, Self::Error> {
        let AssignmentData { givers, receivers } = data;
        if givers.len() != receivers.len() {
            return Err(GiftError::MalformedAssignment {
                reason: "givers and receivers differ in length",
            });
        }
        let giver_set: BTreeSet<&Participant> = givers.iter().collect();
        if giver_set.len() != givers.len() {
            return Err(GiftError::MalformedAssignment {
                reason: "a giver appears twice",
            });
        }
        let receiver_set: BTreeSet<&Participant> = receivers.iter().collect();
        if receiver_set != giver_set {
            return Err(GiftError::MalformedAssignment {
                reason: "receivers are not a permutation of givers",
            });
        }
        Ok(Self { givers, receivers })
    }
}

impl From<Assignment> for AssignmentData {
    fn from(assignment: Assignment) -> Self {
        Self {
            givers: assignment.givers,
            receivers: assignment.receivers,
        }
    }
}
