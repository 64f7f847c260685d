//! One gift exchange: rules, session and registered faces as a single aggregate.
//!
//! Every participant change goes through [`Exchange`], which cascades it to all
//! structures keyed by participant name before returning. Callers never see a
//! half-renamed or half-removed participant.

use std::sync::{Arc, Mutex};

use rand::Rng;
use secret_gift_core::{
    Assignment, AssignmentGenerator, AssignmentSession, GiftError, Participant, RuleStore,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OpsError, OpsResult};
use crate::faces::FaceRegistry;
use crate::matcher::{FaceEncoding, FaceMatcher};

/// Smallest group that can complete setup.
pub const MIN_PARTICIPANTS: usize = 2;

/// An exchange behind a lock, for hosts that serve several callers.
///
/// Each mutating operation holds the lock for its whole duration.
pub type SharedExchange = Arc<Mutex<Exchange>>;

/// Rule store, assignment session and face registry of one exchange.
///
/// Structural edits (participants or rules) discard the current assignment;
/// it is regenerated wholesale the next time one is needed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exchange {
    rules: RuleStore,

    #[serde(default)]
    session: AssignmentSession,

    /// Persisted separately in the face-data file.
    #[serde(skip)]
    faces: FaceRegistry,

    #[serde(default)]
    setup_complete: bool,
}

impl Exchange {
    /// Create an empty exchange that generates with `generator`.
    pub fn new(generator: AssignmentGenerator) -> Self {
        Self {
            session: AssignmentSession::new(generator),
            ..Self::default()
        }
    }

    /// Wrap the exchange in a per-exchange lock.
    pub fn into_shared(self) -> SharedExchange {
        Arc::new(Mutex::new(self))
    }

    /// The rule store.
    pub fn rules(&self) -> &RuleStore {
        &self.rules
    }

    /// The assignment session.
    pub fn session(&self) -> &AssignmentSession {
        &self.session
    }

    /// The registered faces.
    pub fn faces(&self) -> &FaceRegistry {
        &self.faces
    }

    /// Whether setup has been completed.
    pub fn is_setup_complete(&self) -> bool {
        self.setup_complete
    }

    /// Replace the generator used by future reshuffles.
    pub fn set_generator(&mut self, generator: AssignmentGenerator) {
        self.session.set_generator(generator);
    }

    // =========================================================================
    // Participants
    // =========================================================================

    /// Add a single participant.
    pub fn add_participant(&mut self, name: &str) -> OpsResult<()> {
        self.rules.add_participant(name)?;
        self.invalidate("participant_added");
        Ok(())
    }

    /// Add every new name from a comma-separated list.
    pub fn add_participants_csv(&mut self, input: &str) -> Vec<Participant> {
        let added = self.rules.add_participants_csv(input);
        if !added.is_empty() {
            self.invalidate("participants_added");
        }
        added
    }

    /// Rename a participant across rules, assignment, verification and faces.
    pub fn rename_participant(&mut self, old: &str, new: &str) -> OpsResult<Participant> {
        let new = self.rules.rename_participant(old, new)?;
        if new == old {
            return Ok(new);
        }
        self.session.rename_participant(old, &new);
        self.faces.rename(old, &new);
        info!(from = old, to = %new, "participant_renamed");
        Ok(new)
    }

    /// Remove a participant, their rules and their face.
    pub fn remove_participant(&mut self, name: &str) -> OpsResult<Participant> {
        let removed = self.rules.remove_participant(name)?;
        self.faces.remove(name);
        if self.rules.len() < MIN_PARTICIPANTS {
            self.setup_complete = false;
        }
        self.invalidate("participant_removed");
        Ok(removed)
    }

    // =========================================================================
    // Rules
    // =========================================================================

    /// Forbid `giver → receiver`.
    pub fn add_restriction(&mut self, giver: &str, receiver: &str) -> OpsResult<bool> {
        let added = self.rules.add_restriction(giver, receiver)?;
        if added {
            self.invalidate("restriction_added");
        }
        Ok(added)
    }

    /// Require `giver → receiver`.
    pub fn add_mandate(&mut self, giver: &str, receiver: &str) -> OpsResult<bool> {
        let added = self.rules.add_mandate(giver, receiver)?;
        if added {
            self.invalidate("mandate_added");
        }
        Ok(added)
    }

    /// Drop a restriction if present.
    pub fn remove_restriction(&mut self, giver: &str, receiver: &str) -> bool {
        let removed = self.rules.remove_restriction(giver, receiver);
        if removed {
            self.invalidate("restriction_removed");
        }
        removed
    }

    /// Drop a giver's mandate if present.
    pub fn remove_mandate(&mut self, giver: &str) -> Option<Participant> {
        let removed = self.rules.remove_mandate(giver);
        if removed.is_some() {
            self.invalidate("mandate_removed");
        }
        removed
    }

    // =========================================================================
    // Setup and assignment
    // =========================================================================

    /// Finish setup and generate the first assignment.
    ///
    /// Setup stays open when generation fails, so rules can be relaxed.
    pub fn complete_setup(&mut self) -> OpsResult<&Assignment> {
        self.require_min_participants()?;
        self.setup_complete = true;
        if let Err(err) = self.ensure_assignment().map(|_| ()) {
            self.setup_complete = false;
            return Err(err);
        }
        self.current_assignment()
    }

    /// Go back to setup, discarding the assignment.
    pub fn reopen_setup(&mut self) {
        self.setup_complete = false;
        self.session.clear();
        info!("setup_reopened");
    }

    /// Generate a fresh assignment, clearing every verification.
    pub fn reshuffle(&mut self) -> OpsResult<&Assignment> {
        self.reshuffle_with(&mut rand::rng())
    }

    /// [`Exchange::reshuffle`] with an explicit RNG.
    pub fn reshuffle_with<R: Rng>(&mut self, rng: &mut R) -> OpsResult<&Assignment> {
        self.require_setup()?;
        Ok(self.session.reshuffle_with(&self.rules, rng)?)
    }

    /// Return the current assignment, generating one if setup is complete and
    /// none exists yet.
    pub fn ensure_assignment(&mut self) -> OpsResult<&Assignment> {
        self.require_setup()?;
        if !self.session.has_assignment() {
            self.session.reshuffle(&self.rules)?;
        }
        self.current_assignment()
    }

    /// Recipient of `giver` in the current assignment.
    pub fn current_recipient(&self, giver: &str) -> OpsResult<&Participant> {
        Ok(self.session.current_recipient(giver)?)
    }

    /// Whether `name` verified against the current assignment.
    pub fn is_verified(&self, name: &str) -> bool {
        self.session.is_verified(name)
    }

    /// Drop everything and start over with the same generator.
    pub fn reset(&mut self) {
        let generator = self.session.generator().clone();
        *self = Self::new(generator);
        info!("exchange_reset");
    }

    // =========================================================================
    // Faces and identity verification
    // =========================================================================

    /// Store a face encoding for an existing participant.
    pub fn register_face(&mut self, name: &str, encoding: FaceEncoding) -> OpsResult<()> {
        let participant = self.known(name)?;
        let replaced = self.faces.register(participant, encoding).is_some();
        info!(participant = name, replaced, "face_registered");
        Ok(())
    }

    /// Detect, encode and store a face from an image.
    pub fn register_face_image(
        &mut self,
        name: &str,
        image: &[u8],
        matcher: &dyn FaceMatcher,
    ) -> OpsResult<()> {
        self.known(name)?;
        let encoding = matcher
            .detect_and_encode(image)
            .ok_or(OpsError::NoFaceDetected)?;
        self.register_face(name, encoding)
    }

    /// Confirm that `probe` belongs to `claimed` and reveal their recipient.
    ///
    /// Registered faces are searched in participant order and the first match
    /// within `tolerance` decides who the probe is. On success the claimed
    /// participant is marked verified for the current assignment.
    pub fn verify(
        &mut self,
        claimed: &str,
        probe: &FaceEncoding,
        matcher: &dyn FaceMatcher,
        tolerance: f64,
    ) -> OpsResult<Participant> {
        let claimed = self.known(claimed)?;
        if !self.faces.is_registered(claimed.as_str()) {
            return Err(OpsError::NotRegistered { name: claimed });
        }

        let actual = self
            .faces
            .find_match(self.rules.participants(), probe, matcher, tolerance)
            .cloned()
            .ok_or(OpsError::NotRecognized)?;
        if actual != claimed {
            debug!(%claimed, %actual, "identity_mismatch");
            return Err(OpsError::IdentityMismatch { claimed, actual });
        }

        self.ensure_assignment()?;
        self.session.mark_verified(claimed.as_str())?;
        let recipient = self.session.current_recipient(claimed.as_str())?.clone();
        info!(participant = %claimed, "identity_verified");
        Ok(recipient)
    }

    /// [`Exchange::verify`] starting from a raw image.
    pub fn verify_image(
        &mut self,
        claimed: &str,
        image: &[u8],
        matcher: &dyn FaceMatcher,
        tolerance: f64,
    ) -> OpsResult<Participant> {
        self.known(claimed)?;
        let probe = matcher
            .detect_and_encode(image)
            .ok_or(OpsError::NoFaceDetected)?;
        self.verify(claimed, &probe, matcher, tolerance)
    }

    /// Replace the face registry, keeping only current participants.
    ///
    /// Returns the names that were dropped because they are not participants.
    pub fn replace_faces(&mut self, mut faces: FaceRegistry) -> Vec<Participant> {
        let mut dropped = Vec::new();
        faces.retain(|name| {
            let keep = self.rules.contains(name.as_str());
            if !keep {
                dropped.push(name.clone());
            }
            keep
        });
        self.faces = faces;
        dropped
    }

    /// Re-check restored state: drop an assignment that no longer fits the
    /// rules and faces of unknown participants.
    pub fn revalidate(&mut self) {
        self.session.revalidate(&self.rules);
        let rules = &self.rules;
        self.faces.retain(|name| rules.contains(name.as_str()));
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn known(&self, name: &str) -> OpsResult<Participant> {
        self.rules
            .participants()
            .iter()
            .find(|p| *p == name)
            .cloned()
            .ok_or_else(|| GiftError::unknown(name).into())
    }

    fn current_assignment(&self) -> OpsResult<&Assignment> {
        self.session
            .assignment()
            .ok_or_else(|| GiftError::NoAssignment.into())
    }

    fn require_min_participants(&self) -> OpsResult<()> {
        if self.rules.len() < MIN_PARTICIPANTS {
            return Err(OpsError::SetupIncomplete {
                participants: self.rules.len(),
                minimum: MIN_PARTICIPANTS,
            });
        }
        Ok(())
    }

    fn require_setup(&self) -> OpsResult<()> {
        self.require_min_participants()?;
        if !self.setup_complete {
            return Err(OpsError::SetupIncomplete {
                participants: self.rules.len(),
                minimum: MIN_PARTICIPANTS,
            });
        }
        Ok(())
    }

    fn invalidate(&mut self, reason: &'static str) {
        if self.session.has_assignment() {
            info!(reason, "assignment_invalidated");
        }
        self.session.clear();
    }
}
