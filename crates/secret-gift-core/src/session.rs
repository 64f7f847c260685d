//! The committed assignment and who has verified against it.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::assignment::Assignment;
use crate::error::{GiftError, GiftResult};
use crate::generator::AssignmentGenerator;
use crate::participant::Participant;
use crate::rules::RuleStore;

/// Holds the current assignment (if any) and per-participant verification.
///
/// Every reshuffle starts a new generation and clears all verification, so a
/// confirmation made against an old assignment can never reveal a new one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentSession {
    assignment: Option<Assignment>,

    #[serde(default)]
    verified: BTreeSet<Participant>,

    /// Number of successful reshuffles so far.
    #[serde(default)]
    generation: u64,

    #[serde(skip)]
    generator: AssignmentGenerator,
}

impl AssignmentSession {
    /// Create an empty session that generates with `generator`.
    pub fn new(generator: AssignmentGenerator) -> Self {
        Self {
            generator,
            ..Self::default()
        }
    }

    /// Replace the generator used by future reshuffles.
    pub fn set_generator(&mut self, generator: AssignmentGenerator) {
        self.generator = generator;
    }

    /// The generator used by reshuffles.
    pub fn generator(&self) -> &AssignmentGenerator {
        &self.generator
    }

    /// The current assignment.
    pub fn assignment(&self) -> Option<&Assignment> {
        self.assignment.as_ref()
    }

    /// Whether an assignment has been generated.
    pub fn has_assignment(&self) -> bool {
        self.assignment.is_some()
    }

    /// Number of successful reshuffles.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Receiver assigned to `giver`.
    pub fn current_recipient(&self, giver: &str) -> GiftResult<&Participant> {
        self.assignment
            .as_ref()
            .ok_or(GiftError::NoAssignment)?
            .recipient_of(giver)
            .ok_or_else(|| GiftError::unknown(giver))
    }

    /// Discard the assignment and all verification, then generate a new one.
    ///
    /// On failure the session is left without an assignment.
    pub fn reshuffle(&mut self, rules: &RuleStore) -> GiftResult<&Assignment> {
        self.reshuffle_with(rules, &mut rand::rng())
    }

    /// [`AssignmentSession::reshuffle`] with an explicit RNG.
    pub fn reshuffle_with<R: Rng>(&mut self, rules: &RuleStore, rng: &mut R) -> GiftResult<&Assignment> {
        self.clear();
        let assignment = self.generator.generate_with(rules, rng)?;
        self.generation += 1;
        info!(
            participants = assignment.len(),
            generation = self.generation,
            "assignment_reshuffled"
        );
        Ok(&*self.assignment.insert(assignment))
    }

    /// Drop the assignment and every verification.
    pub fn clear(&mut self) {
        if self.assignment.take().is_some() {
            debug!("assignment_discarded");
        }
        self.verified.clear();
    }

    /// Record that `name` confirmed their identity against this generation.
    pub fn mark_verified(&mut self, name: &str) -> GiftResult<()> {
        let giver = self
            .assignment
            .as_ref()
            .ok_or(GiftError::NoAssignment)?
            .givers()
            .iter()
            .find(|g| *g == name)
            .cloned()
            .ok_or_else(|| GiftError::unknown(name))?;
        debug!(participant = name, generation = self.generation, "participant_verified");
        self.verified.insert(giver);
        Ok(())
    }

    /// Whether `name` has verified against the current assignment.
    pub fn is_verified(&self, name: &str) -> bool {
        self.verified.contains(name)
    }

    /// Follow a participant rename without invalidating the assignment.
    pub fn rename_participant(&mut self, old: &str, new: &Participant) {
        if let Some(assignment) = &mut self.assignment {
            assignment.rename(old, new);
        }
        if self.verified.remove(old) {
            self.verified.insert(new.clone());
        }
    }

    /// Drop the assignment if it no longer fits `rules`.
    ///
    /// Returns whether an assignment survived.
    pub fn revalidate(&mut self, rules: &RuleStore) -> bool {
        let fits = self.assignment.as_ref().map(|a| a.satisfies(rules));
        match fits {
            Some(true) => true,
            Some(false) => {
                debug!("stale_assignment_dropped");
                self.clear();
                false
            }
            None => {
                self.verified.clear();
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn rules(names: &[&str]) -> RuleStore {
        let mut rules = RuleStore::new();
        for name in names {
            rules.add_participant(*name).unwrap();
        }
        rules
    }

    #[test]
    fn test_recipient_before_generation() {
        let session = AssignmentSession::default();
        assert_eq!(session.current_recipient("Ann"), Err(GiftError::NoAssignment));
    }

    #[test]
    fn test_recipient_unknown_giver() {
        let mut session = AssignmentSession::default();
        session.reshuffle(&rules(&["Ann", "Bob"])).unwrap();
        assert_eq!(session.current_recipient("Zed"), Err(GiftError::unknown("Zed")));
        assert_eq!(session.current_recipient("Ann").unwrap(), "Bob");
    }

    #[test]
    fn test_reshuffle_clears_all_verification() {
        let rules = rules(&["Ann", "Bob", "Cid", "Dee"]);
        let mut session = AssignmentSession::default();
        let mut rng = StdRng::seed_from_u64(3);

        session.reshuffle_with(&rules, &mut rng).unwrap();
        session.mark_verified("Ann").unwrap();
        session.mark_verified("Cid").unwrap();
        assert!(session.is_verified("Ann"));

        session.reshuffle_with(&rules, &mut rng).unwrap();
        for name in ["Ann", "Bob", "Cid", "Dee"] {
            assert!(!session.is_verified(name));
        }
        assert_eq!(session.generation(), 2);
    }

    #[test]
    fn test_failed_reshuffle_leaves_no_assignment() {
        let mut rules = rules(&["A", "B"]);
        let mut session = AssignmentSession::default();
        session.reshuffle(&rules).unwrap();
        session.mark_verified("A").unwrap();

        rules.add_restriction("A", "B").unwrap();
        assert_eq!(
            session.reshuffle(&rules).unwrap_err(),
            GiftError::Infeasible { participants: 2 }
        );
        assert!(!session.has_assignment());
        assert!(!session.is_verified("A"));
        assert_eq!(session.current_recipient("A"), Err(GiftError::NoAssignment));
    }

    #[test]
    fn test_mark_verified_requires_assignment() {
        let mut session = AssignmentSession::default();
        assert_eq!(session.mark_verified("A"), Err(GiftError::NoAssignment));

        session.reshuffle(&rules(&["A", "B"])).unwrap();
        assert_eq!(session.mark_verified("Q"), Err(GiftError::unknown("Q")));
    }

    #[test]
    fn test_rename_keeps_assignment_and_verification() {
        let mut rules = rules(&["A", "B"]);
        let mut session = AssignmentSession::default();
        session.reshuffle(&rules).unwrap();
        session.mark_verified("A").unwrap();

        rules.rename_participant("A", "A2").unwrap();
        session.rename_participant("A", &Participant::from("A2"));

        assert!(session.revalidate(&rules));
        assert!(session.is_verified("A2"));
        assert!(!session.is_verified("A"));
        assert_eq!(session.current_recipient("A2").unwrap(), "B");
        assert_eq!(session.current_recipient("B").unwrap(), "A2");
    }

    #[test]
    fn test_revalidate_drops_stale_assignment() {
        let mut rules = rules(&["A", "B", "C"]);
        let mut session = AssignmentSession::default();
        session.reshuffle(&rules).unwrap();

        rules.add_participant("D").unwrap();
        assert!(!session.revalidate(&rules));
        assert!(!session.has_assignment());
    }

    #[test]
    fn test_restored_session_rejects_malformed_assignment() {
        let short = r#"{"assignment":{"givers":["A","B"],"receivers":["B"]},"verified":[],"generation":1}"#;
        assert!(serde_json::from_str::<AssignmentSession>(short).is_err());

        let not_permutation = r#"{"assignment":{"givers":["A","B"],"receivers":["B","C"]}}"#;
        assert!(serde_json::from_str::<AssignmentSession>(not_permutation).is_err());

        let repeated = r#"{"assignment":{"givers":["A","A"],"receivers":["A","A"]}}"#;
        assert!(serde_json::from_str::<AssignmentSession>(repeated).is_err());

        let valid = r#"{"assignment":{"givers":["A","B"],"receivers":["B","A"]},"generation":1}"#;
        let session: AssignmentSession = serde_json::from_str(valid).unwrap();
        assert_eq!(session.current_recipient("B").unwrap(), "A");
        assert_eq!(session.current_recipient("C"), Err(GiftError::unknown("C")));
    }

    #[test]
    fn test_session_survives_serde_round_trip() {
        let rules = rules(&["Ann", "Bob", "Cid"]);
        let mut session = AssignmentSession::default();
        session.reshuffle_with(&rules, &mut StdRng::seed_from_u64(5)).unwrap();
        session.mark_verified("Bob").unwrap();

        let json = serde_json::to_string(&session).unwrap();
        let mut restored: AssignmentSession = serde_json::from_str(&json).unwrap();
        assert!(restored.revalidate(&rules));
        assert!(restored.is_verified("Bob"));
        assert_eq!(restored.generation(), 1);
        assert_eq!(
            restored.current_recipient("Ann").unwrap(),
            session.current_recipient("Ann").unwrap()
        );
    }
}
