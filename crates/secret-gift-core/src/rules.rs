//! Participant registry and the two constraint relations.
//!
//! The store is the aggregate that owns every rule. All mutators validate
//! first and mutate second, so a rejected call never leaves partial state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GiftError, GiftResult};
use crate::participant::Participant;

/// Participants plus restrictions (giver → forbidden receivers) and
/// mandates (giver → required receiver).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleStoreData", into = "RuleStoreData")]
pub struct RuleStore {
    participants: Vec<Participant>,
    restrictions: BTreeMap<Participant, BTreeSet<Participant>>,
    mandates: BTreeMap<Participant, Participant>,
}

/// Plain-data form of a [`RuleStore`] used for persistence.
///
/// Converting back into a store re-applies every rule through the normal
/// mutators, so invalid data is rejected with the same errors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleStoreData {
    /// Participants in insertion order.
    pub participants: Vec<Participant>,

    /// Forbidden receivers per giver.
    #[serde(default)]
    pub restrictions: BTreeMap<Participant, Vec<Participant>>,

    /// Required receiver per giver.
    #[serde(default)]
    pub mandates: BTreeMap<Participant, Participant>,
}

impl RuleStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from plain data, validating every invariant.
    pub fn from_parts(data: RuleStoreData) -> GiftResult<Self> {
        let mut store = Self::new();
        for name in data.participants {
            store.add_participant(name)?;
        }
        for (giver, receivers) in &data.restrictions {
            for receiver in receivers {
                store.add_restriction(giver.as_str(), receiver.as_str())?;
            }
        }
        for (giver, receiver) in &data.mandates {
            store.add_mandate(giver.as_str(), receiver.as_str())?;
        }
        Ok(store)
    }

    /// Export the store as plain data.
    pub fn to_parts(&self) -> RuleStoreData {
        RuleStoreData {
            participants: self.participants.clone(),
            restrictions: self
                .restrictions
                .iter()
                .map(|(giver, set)| (giver.clone(), set.iter().cloned().collect()))
                .collect(),
            mandates: self.mandates.clone(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Participants in insertion order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Number of participants.
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether the store has no participants.
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Check whether a participant exists (exact, case-sensitive match).
    pub fn contains(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p == name)
    }

    /// Position of a participant in insertion order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.participants.iter().position(|p| p == name)
    }

    /// Forbidden receivers for a giver.
    pub fn restrictions_for(&self, giver: &str) -> Option<&BTreeSet<Participant>> {
        self.restrictions.get(giver)
    }

    /// Required receiver for a giver.
    pub fn mandate_for(&self, giver: &str) -> Option<&Participant> {
        self.mandates.get(giver)
    }

    /// All restrictions as (giver, receiver) pairs.
    pub fn restrictions(&self) -> impl Iterator<Item = (&Participant, &Participant)> {
        self.restrictions
            .iter()
            .flat_map(|(giver, set)| set.iter().map(move |receiver| (giver, receiver)))
    }

    /// All mandates as (giver, receiver) pairs.
    pub fn mandates(&self) -> impl Iterator<Item = (&Participant, &Participant)> {
        self.mandates.iter()
    }

    /// Total number of restrictions and mandates.
    pub fn rule_count(&self) -> usize {
        self.restrictions.values().map(BTreeSet::len).sum::<usize>() + self.mandates.len()
    }

    /// Whether `giver → receiver` is explicitly forbidden.
    pub fn is_restricted(&self, giver: &str, receiver: &str) -> bool {
        self.restrictions
            .get(giver)
            .is_some_and(|set| set.contains(receiver))
    }

    /// Whether a single `giver → receiver` pairing is permitted by every rule.
    pub fn allows(&self, giver: &str, receiver: &str) -> bool {
        if giver == receiver || self.is_restricted(giver, receiver) {
            return false;
        }
        match self.mandates.get(giver) {
            Some(required) => required == receiver,
            None => true,
        }
    }

    // =========================================================================
    // Participant mutators
    // =========================================================================

    /// Add a participant with no rules. Surrounding whitespace is trimmed.
    pub fn add_participant(&mut self, name: impl Into<Participant>) -> GiftResult<()> {
        let name = trimmed(name.into())?;
        if self.contains(name.as_str()) {
            return Err(GiftError::DuplicateParticipant { name });
        }
        debug!(participant = %name, "participant_added");
        self.participants.push(name);
        Ok(())
    }

    /// Add every name from a comma-separated list.
    ///
    /// Names are trimmed, blanks are dropped and names already present are
    /// skipped. Returns the participants that were actually added.
    pub fn add_participants_csv(&mut self, input: &str) -> Vec<Participant> {
        let mut added = Vec::new();
        for name in input.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            if self.add_participant(name).is_ok() {
                added.push(Participant::from(name));
            }
        }
        added
    }

    /// Rename a participant and every rule that mentions them.
    ///
    /// The new name is trimmed like in [`RuleStore::add_participant`]; the
    /// stored name is returned. Renaming to the current name is a no-op.
    pub fn rename_participant(
        &mut self,
        old: &str,
        new: impl Into<Participant>,
    ) -> GiftResult<Participant> {
        let idx = self.position(old).ok_or_else(|| GiftError::unknown(old))?;
        let new = trimmed(new.into())?;
        if new == old {
            return Ok(new);
        }
        if self.contains(new.as_str()) {
            return Err(GiftError::DuplicateParticipant { name: new });
        }

        self.participants[idx] = new.clone();

        if let Some(set) = self.restrictions.remove(old) {
            self.restrictions.insert(new.clone(), set);
        }
        for set in self.restrictions.values_mut() {
            if set.remove(old) {
                set.insert(new.clone());
            }
        }

        if let Some(receiver) = self.mandates.remove(old) {
            self.mandates.insert(new.clone(), receiver);
        }
        for receiver in self.mandates.values_mut() {
            if receiver == old {
                *receiver = new.clone();
            }
        }

        debug!(from = old, to = %new, "participant_renamed");
        Ok(new)
    }

    /// Remove a participant and every rule referencing them as giver or receiver.
    pub fn remove_participant(&mut self, name: &str) -> GiftResult<Participant> {
        let idx = self.position(name).ok_or_else(|| GiftError::unknown(name))?;
        let removed = self.participants.remove(idx);

        self.restrictions.remove(name);
        self.restrictions.retain(|_, set| {
            set.remove(name);
            !set.is_empty()
        });
        self.mandates.remove(name);
        self.mandates.retain(|_, receiver| receiver != name);

        debug!(participant = name, "participant_removed");
        Ok(removed)
    }

    // =========================================================================
    // Rule mutators
    // =========================================================================

    /// Forbid `giver → receiver`. Returns `false` if it was already forbidden.
    pub fn add_restriction(&mut self, giver: &str, receiver: &str) -> GiftResult<bool> {
        let (giver, receiver) = self.rule_endpoints(giver, receiver)?;
        if self.mandates.get(&giver) == Some(&receiver) {
            return Err(GiftError::MandateConflict { giver, receiver });
        }
        let inserted = self
            .restrictions
            .entry(giver.clone())
            .or_default()
            .insert(receiver.clone());
        if inserted {
            debug!(%giver, %receiver, "restriction_added");
        }
        Ok(inserted)
    }

    /// Require `giver → receiver`. Returns `false` if that exact mandate existed.
    ///
    /// A giver already mandated to someone else is rejected with
    /// [`GiftError::MultipleMandates`] rather than overwritten.
    pub fn add_mandate(&mut self, giver: &str, receiver: &str) -> GiftResult<bool> {
        let (giver, receiver) = self.rule_endpoints(giver, receiver)?;
        if self.is_restricted(giver.as_str(), receiver.as_str()) {
            return Err(GiftError::RestrictionConflict { giver, receiver });
        }
        if let Some(existing) = self.mandates.get(&giver) {
            if *existing == receiver {
                return Ok(false);
            }
            return Err(GiftError::MultipleMandates {
                existing: existing.clone(),
                giver,
                requested: receiver,
            });
        }
        debug!(%giver, %receiver, "mandate_added");
        self.mandates.insert(giver, receiver);
        Ok(true)
    }

    /// Drop a restriction. Returns whether anything was removed.
    pub fn remove_restriction(&mut self, giver: &str, receiver: &str) -> bool {
        let Some(set) = self.restrictions.get_mut(giver) else {
            return false;
        };
        let removed = set.remove(receiver);
        if set.is_empty() {
            self.restrictions.remove(giver);
        }
        if removed {
            debug!(giver, receiver, "restriction_removed");
        }
        removed
    }

    /// Drop the mandate of a giver, returning the receiver it pointed at.
    pub fn remove_mandate(&mut self, giver: &str) -> Option<Participant> {
        let removed = self.mandates.remove(giver);
        if let Some(receiver) = &removed {
            debug!(giver, %receiver, "mandate_removed");
        }
        removed
    }

    /// Resolve both ends of a new rule, rejecting unknown names and self-pairs.
    fn rule_endpoints(&self, giver: &str, receiver: &str) -> GiftResult<(Participant, Participant)> {
        if !self.contains(giver) {
            return Err(GiftError::unknown(giver));
        }
        if !self.contains(receiver) {
            return Err(GiftError::unknown(receiver));
        }
        if giver == receiver {
            return Err(GiftError::SelfReference {
                name: giver.into(),
            });
        }
        Ok((giver.into(), receiver.into()))
    }
}

/// Strip surrounding whitespace, rejecting names that are left empty.
fn trimmed(name: Participant) -> GiftResult<Participant> {
    let trimmed = name.as_str().trim();
    if trimmed.is_empty() {
        Err(GiftError::EmptyName)
    } else if trimmed.len() == name.as_str().len() {
        Ok(name)
    } else {
        Ok(Participant::from(trimmed))
    }
}

impl TryFrom<RuleStoreData> for RuleStore {
    type Error = GiftError;

    fn try_from(data: RuleStoreData) -> Result<Self, Self::Error> {
        Self::from_parts(data)
    }
}

impl From<RuleStore> for RuleStoreData {
    fn from(store: RuleStore) -> Self {
        store.to_parts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(names: &[&str]) -> RuleStore {
        let mut store = RuleStore::new();
        for name in names {
            store.add_participant(*name).unwrap();
        }
        store
    }

    #[test]
    fn test_add_participant_rejects_duplicates() {
        let mut rules = store(&["Ann"]);
        assert_eq!(
            rules.add_participant("Ann"),
            Err(GiftError::DuplicateParticipant { name: "Ann".into() })
        );
        // Case-sensitive: "ann" is a different person.
        rules.add_participant("ann").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules.rule_count(), 0);
    }

    #[test]
    fn test_add_participant_rejects_blank_names() {
        let mut rules = RuleStore::new();
        assert_eq!(rules.add_participant("   "), Err(GiftError::EmptyName));
        assert!(rules.is_empty());
    }

    #[test]
    fn test_add_participants_csv_trims_and_skips() {
        let mut rules = store(&["Ram"]);
        let added = rules.add_participants_csv(" Ram, Sita , ,Kannan,Sita");
        assert_eq!(added, vec![Participant::from("Sita"), Participant::from("Kannan")]);
        assert_eq!(rules.participants(), &["Ram", "Sita", "Kannan"].map(Participant::from));
    }

    #[test]
    fn test_restriction_then_mandate_conflicts() {
        let mut rules = store(&["A", "B", "C"]);
        rules.add_restriction("A", "B").unwrap();
        let before = rules.clone();

        assert_eq!(
            rules.add_mandate("A", "B"),
            Err(GiftError::RestrictionConflict {
                giver: "A".into(),
                receiver: "B".into()
            })
        );
        assert_eq!(rules, before);
    }

    #[test]
    fn test_mandate_then_restriction_conflicts() {
        let mut rules = store(&["A", "B", "C"]);
        rules.add_mandate("A", "B").unwrap();
        let before = rules.clone();

        assert_eq!(
            rules.add_restriction("A", "B"),
            Err(GiftError::MandateConflict {
                giver: "A".into(),
                receiver: "B".into()
            })
        );
        assert_eq!(rules, before);
    }

    #[test]
    fn test_second_mandate_is_rejected_not_overwritten() {
        let mut rules = store(&["A", "B", "C"]);
        assert!(rules.add_mandate("A", "B").unwrap());
        assert!(!rules.add_mandate("A", "B").unwrap());

        let err = rules.add_mandate("A", "C").unwrap_err();
        assert!(matches!(err, GiftError::MultipleMandates { .. }));
        assert_eq!(rules.mandate_for("A").map(Participant::as_str), Some("B"));
    }

    #[test]
    fn test_self_reference_rejected() {
        let mut rules = store(&["A", "B"]);
        assert!(matches!(
            rules.add_restriction("A", "A"),
            Err(GiftError::SelfReference { .. })
        ));
        assert!(matches!(
            rules.add_mandate("B", "B"),
            Err(GiftError::SelfReference { .. })
        ));
        assert_eq!(rules.rule_count(), 0);
    }

    #[test]
    fn test_rules_require_known_participants() {
        let mut rules = store(&["A", "B"]);
        assert_eq!(rules.add_restriction("A", "Z"), Err(GiftError::unknown("Z")));
        assert_eq!(rules.add_mandate("Z", "A"), Err(GiftError::unknown("Z")));
    }

    #[test]
    fn test_restriction_is_idempotent_and_asymmetric() {
        let mut rules = store(&["A", "B"]);
        assert!(rules.add_restriction("A", "B").unwrap());
        assert!(!rules.add_restriction("A", "B").unwrap());
        assert!(rules.is_restricted("A", "B"));
        assert!(!rules.is_restricted("B", "A"));
    }

    #[test]
    fn test_rename_cascades_through_rules() {
        let mut rules = store(&["A", "B", "C"]);
        rules.add_restriction("A", "B").unwrap();
        rules.add_restriction("C", "A").unwrap();
        rules.add_mandate("B", "A").unwrap();
        rules.add_mandate("A", "C").unwrap();

        rules.rename_participant("A", "A2").unwrap();

        assert_eq!(
            rules.restrictions_for("A2").unwrap().iter().collect::<Vec<_>>(),
            vec![&Participant::from("B")]
        );
        assert!(rules.is_restricted("C", "A2"));
        assert_eq!(rules.mandate_for("B").unwrap(), "A2");
        assert_eq!(rules.mandate_for("A2").unwrap(), "C");

        let mentions_old = rules.participants().iter().any(|p| p == "A")
            || rules.restrictions().any(|(g, r)| g == "A" || r == "A")
            || rules.mandates().any(|(g, r)| g == "A" || r == "A");
        assert!(!mentions_old);
    }

    #[test]
    fn test_rename_errors() {
        let mut rules = store(&["A", "B"]);
        assert_eq!(rules.rename_participant("Z", "Y"), Err(GiftError::unknown("Z")));
        assert_eq!(
            rules.rename_participant("A", "B"),
            Err(GiftError::DuplicateParticipant { name: "B".into() })
        );
        rules.rename_participant("A", "A").unwrap();
        assert_eq!(rules.participants(), &["A", "B"].map(Participant::from));
    }

    #[test]
    fn test_names_are_trimmed_on_add_and_rename() {
        let mut rules = RuleStore::new();
        rules.add_participant(" Ann ").unwrap();
        rules.add_participant("Bob\t").unwrap();
        assert_eq!(rules.participants(), &["Ann", "Bob"].map(Participant::from));
        assert_eq!(
            rules.add_participant("  Ann"),
            Err(GiftError::DuplicateParticipant { name: "Ann".into() })
        );

        assert_eq!(
            rules.rename_participant("Ann", " Bob "),
            Err(GiftError::DuplicateParticipant { name: "Bob".into() })
        );
        assert_eq!(rules.rename_participant("Ann", "  "), Err(GiftError::EmptyName));
        assert_eq!(rules.rename_participant("Ann", " Ann "), Ok(Participant::from("Ann")));

        rules.add_restriction("Bob", "Ann").unwrap();
        assert_eq!(rules.rename_participant("Ann", " Bea "), Ok(Participant::from("Bea")));
        assert_eq!(rules.participants(), &["Bea", "Bob"].map(Participant::from));
        assert!(rules.is_restricted("Bob", "Bea"));
    }

    #[test]
    fn test_remove_participant_drops_rules() {
        let mut rules = store(&["A", "B", "C"]);
        rules.add_restriction("A", "B").unwrap();
        rules.add_restriction("C", "B").unwrap();
        rules.add_restriction("C", "A").unwrap();
        rules.add_mandate("B", "C").unwrap();

        rules.remove_participant("B").unwrap();

        assert_eq!(rules.participants(), &["A", "C"].map(Participant::from));
        assert!(rules.restrictions_for("A").is_none());
        assert!(rules.is_restricted("C", "A"));
        assert!(rules.mandate_for("B").is_none());
        assert_eq!(rules.rule_count(), 1);
    }

    #[test]
    fn test_remove_rules_noop_when_absent() {
        let mut rules = store(&["A", "B"]);
        assert!(!rules.remove_restriction("A", "B"));
        assert!(rules.remove_mandate("A").is_none());

        rules.add_restriction("A", "B").unwrap();
        assert!(rules.remove_restriction("A", "B"));
        assert!(rules.restrictions_for("A").is_none());
    }

    #[test]
    fn test_serde_round_trip_validates() {
        let mut rules = store(&["A", "B", "C"]);
        rules.add_restriction("A", "B").unwrap();
        rules.add_mandate("C", "A").unwrap();

        let json = serde_json::to_string(&rules).unwrap();
        let back: RuleStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rules);

        let bad = r#"{"participants":["A","B"],"restrictions":{"A":["B"]},"mandates":{"A":"B"}}"#;
        assert!(serde_json::from_str::<RuleStore>(bad).is_err());
    }
}
