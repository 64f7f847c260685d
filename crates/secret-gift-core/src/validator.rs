//! Validity check for a complete candidate assignment.
//!
//! The validator looks at each (giver, receiver) position independently. It
//! does not check that the candidate is a permutation; callers only ever hand
//! it permutations of the participant list.

use crate::rules::RuleStore;

/// Decide whether `assignment[i]` is an acceptable receiver for
/// `participants[i]` at every position.
///
/// Returns `false` on a self-assignment, a restricted pair, or a giver whose
/// mandate points somewhere else. Sequences of different length are never valid.
pub fn is_valid<G, R>(participants: &[G], assignment: &[R], rules: &RuleStore) -> bool
where
    G: AsRef<str>,
    R: AsRef<str>,
{
    participants.len() == assignment.len()
        && participants
            .iter()
            .zip(assignment)
            .all(|(giver, receiver)| rules.allows(giver.as_ref(), receiver.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(names: &[&str]) -> RuleStore {
        let mut rules = RuleStore::new();
        for name in names {
            rules.add_participant(*name).unwrap();
        }
        rules
    }

    #[test]
    fn test_rejects_fixed_points() {
        let rules = rules(&["A", "B", "C"]);
        assert!(!is_valid(&["A", "B", "C"], &["A", "C", "B"], &rules));
        assert!(is_valid(&["A", "B", "C"], &["B", "C", "A"], &rules));
    }

    #[test]
    fn test_rejects_restricted_pairs() {
        let mut rules = rules(&["A", "B", "C"]);
        rules.add_restriction("A", "B").unwrap();
        assert!(!is_valid(&["A", "B", "C"], &["B", "C", "A"], &rules));
        assert!(is_valid(&["A", "B", "C"], &["C", "A", "B"], &rules));
    }

    #[test]
    fn test_enforces_mandates() {
        let mut rules = rules(&["A", "B", "C"]);
        rules.add_mandate("A", "B").unwrap();
        assert!(is_valid(&["A", "B", "C"], &["B", "C", "A"], &rules));
        assert!(!is_valid(&["A", "B", "C"], &["C", "A", "B"], &rules));
    }

    #[test]
    fn test_length_mismatch_is_invalid() {
        let rules = rules(&["A", "B"]);
        assert!(!is_valid(&["A", "B"], &["B"], &rules));
    }

    #[test]
    fn test_does_not_check_bijection() {
        // A and B both give to C; only per-position rules are checked.
        let rules = rules(&["A", "B", "C"]);
        assert!(is_valid(&["A", "B", "C"], &["C", "C", "A"], &rules));
    }
}
