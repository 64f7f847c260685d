//! Registered face encodings per participant.

use std::collections::BTreeMap;

use secret_gift_core::Participant;
use serde::{Deserialize, Serialize};

use crate::matcher::{FaceEncoding, FaceMatcher};

/// Participant → stored face encoding.
///
/// Serializes as a plain `{ "name": [f64, ...] }` map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceRegistry {
    encodings: BTreeMap<Participant, FaceEncoding>,
}

impl FaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) the encoding of a participant.
    pub fn register(&mut self, name: Participant, encoding: FaceEncoding) -> Option<FaceEncoding> {
        self.encodings.insert(name, encoding)
    }

    /// Whether a participant has a stored encoding.
    pub fn is_registered(&self, name: &str) -> bool {
        self.encodings.contains_key(name)
    }

    /// The stored encoding of a participant.
    pub fn get(&self, name: &str) -> Option<&FaceEncoding> {
        self.encodings.get(name)
    }

    /// Forget a participant's encoding.
    pub fn remove(&mut self, name: &str) -> Option<FaceEncoding> {
        self.encodings.remove(name)
    }

    /// Move an encoding to a new name.
    pub fn rename(&mut self, old: &str, new: &Participant) {
        if let Some(encoding) = self.encodings.remove(old) {
            self.encodings.insert(new.clone(), encoding);
        }
    }

    /// Registered participants.
    pub fn names(&self) -> impl Iterator<Item = &Participant> {
        self.encodings.keys()
    }

    /// Number of registered encodings.
    pub fn len(&self) -> usize {
        self.encodings.len()
    }

    /// Whether no encodings are registered.
    pub fn is_empty(&self) -> bool {
        self.encodings.is_empty()
    }

    /// Keep only encodings whose owner satisfies `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Participant) -> bool) {
        self.encodings.retain(|name, _| keep(name));
    }

    /// First participant in `order` whose stored encoding matches `probe`.
    pub fn find_match<'a>(
        &self,
        order: &'a [Participant],
        probe: &FaceEncoding,
        matcher: &dyn FaceMatcher,
        tolerance: f64,
    ) -> Option<&'a Participant> {
        order.iter().find(|name| {
            self.encodings
                .get(name.as_str())
                .is_some_and(|known| matcher.compare(known, probe, tolerance))
        })
    }
}
