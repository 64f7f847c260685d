//! Uniform sampling of valid assignments.
//!
//! Two strategies draw from the same distribution, the uniform one over the
//! full set of valid permutations:
//!
//! - **Exhaustive**: walk every permutation of the participants (Heap's
//!   algorithm), keep those the validator accepts, and pick one uniformly.
//!   Factorial time, so it is capped at a participant ceiling.
//! - **Rejection**: shuffle uniformly and accept the first valid permutation,
//!   up to a retry budget. When the budget runs out the generator falls back
//!   to a complete backtracking search, so infeasibility is only ever reported
//!   after the search space has been exhausted. That search is capped at
//!   [`MAX_BACKTRACKING_PARTICIPANTS`].
//!
//! Both complete walks select with single-slot reservoir sampling: the k-th
//! valid permutation replaces the current pick with probability 1/k, which
//! yields a uniform choice without materialising the valid set.

use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::assignment::Assignment;
use crate::error::{GiftError, GiftResult};
use crate::participant::Participant;
use crate::rules::RuleStore;
use crate::validator::is_valid;

/// Default largest group handled by exhaustive enumeration under [`Strategy::Auto`].
pub const DEFAULT_EXHAUSTIVE_CEILING: usize = 9;

/// Hard upper bound for exhaustive enumeration (12! ≈ 4.8e8 permutations).
pub const MAX_EXHAUSTIVE_CEILING: usize = 12;

/// Largest group the backtracking fallback will search.
///
/// The fallback visits every valid assignment to sample uniformly, which grows
/// factorially under dense restrictions. Above this size a group whose
/// rejection budget runs out fails with [`GiftError::TooManyParticipants`]
/// instead; groups of any size still succeed when a shuffle is accepted.
pub const MAX_BACKTRACKING_PARTICIPANTS: usize = 14;

/// Default number of shuffles tried before falling back to backtracking.
pub const DEFAULT_RETRY_BUDGET: usize = 10_000;

/// How the generator searches for an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Enumerate every permutation and sample from the valid ones.
    Exhaustive,
    /// Shuffle-and-reject with a backtracking fallback.
    Rejection,
    /// Exhaustive up to the ceiling, rejection above it.
    #[default]
    Auto,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Exhaustive => "exhaustive",
            Strategy::Rejection => "rejection",
            Strategy::Auto => "auto",
        };
        f.write_str(name)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exhaustive" => Ok(Strategy::Exhaustive),
            "rejection" => Ok(Strategy::Rejection),
            "auto" => Ok(Strategy::Auto),
            other => Err(format!(
                "unknown strategy '{}' (expected exhaustive, rejection or auto)",
                other
            )),
        }
    }
}

/// Tuning knobs for [`AssignmentGenerator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Search strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// Largest group enumerated exhaustively. Clamped to [`MAX_EXHAUSTIVE_CEILING`].
    #[serde(default = "default_exhaustive_ceiling")]
    pub exhaustive_ceiling: usize,

    /// Shuffles tried by the rejection sampler before backtracking.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: usize,
}

fn default_exhaustive_ceiling() -> usize {
    DEFAULT_EXHAUSTIVE_CEILING
}

fn default_retry_budget() -> usize {
    DEFAULT_RETRY_BUDGET
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            exhaustive_ceiling: DEFAULT_EXHAUSTIVE_CEILING,
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }
}

impl GeneratorConfig {
    /// Same configuration with a different strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Same configuration with a different retry budget.
    pub fn with_retry_budget(mut self, retry_budget: usize) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    /// The ceiling actually enforced.
    pub fn effective_ceiling(&self) -> usize {
        self.exhaustive_ceiling.min(MAX_EXHAUSTIVE_CEILING)
    }
}

/// Draws valid assignments uniformly at random.
#[derive(Debug, Clone, Default)]
pub struct AssignmentGenerator {
    config: GeneratorConfig,
}

impl AssignmentGenerator {
    /// Create a generator with the given configuration.
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Generate an assignment using the thread-local RNG.
    pub fn generate(&self, rules: &RuleStore) -> GiftResult<Assignment> {
        self.generate_with(rules, &mut rand::rng())
    }

    /// Generate an assignment using the supplied RNG.
    ///
    /// Groups of fewer than two participants are always infeasible.
    pub fn generate_with<R: Rng>(&self, rules: &RuleStore, rng: &mut R) -> GiftResult<Assignment> {
        let n = rules.len();
        if n < 2 {
            return Err(GiftError::Infeasible { participants: n });
        }

        let ceiling = self.config.effective_ceiling();
        let exhaustive = match self.config.strategy {
            Strategy::Exhaustive if n > ceiling => {
                return Err(GiftError::TooManyParticipants {
                    participants: n,
                    ceiling,
                });
            }
            Strategy::Exhaustive => true,
            Strategy::Rejection => false,
            Strategy::Auto => n <= ceiling,
        };

        debug!(
            participants = n,
            rules = rules.rule_count(),
            strategy = if exhaustive { "exhaustive" } else { "rejection" },
            "generation_start"
        );

        let receivers = if exhaustive {
            sample_exhaustive(rules, rng)
        } else {
            let allowed = allowed_matrix(rules);
            if allowed.iter().any(|row| !row.contains(&true)) {
                // Some giver has no permitted receiver at all.
                warn!(participants = n, "giver_without_receiver");
                return Err(GiftError::Infeasible { participants: n });
            }
            let indices = match sample_rejection(&allowed, self.config.retry_budget, rng) {
                Some(indices) => Some(indices),
                None if n > MAX_BACKTRACKING_PARTICIPANTS => {
                    warn!(
                        participants = n,
                        ceiling = MAX_BACKTRACKING_PARTICIPANTS,
                        "rejection_budget_exhausted_group_too_large_to_search"
                    );
                    return Err(GiftError::TooManyParticipants {
                        participants: n,
                        ceiling: MAX_BACKTRACKING_PARTICIPANTS,
                    });
                }
                None => {
                    debug!(
                        budget = self.config.retry_budget,
                        "rejection_budget_exhausted_falling_back_to_backtracking"
                    );
                    sample_backtracking(&allowed, rng)
                }
            };
            indices.map(|indices| resolve_indices(rules.participants(), &indices))
        };

        match receivers {
            Some(receivers) => {
                debug!(participants = n, "generation_complete");
                Ok(Assignment::new(rules.participants().to_vec(), receivers))
            }
            None => {
                warn!(participants = n, "no_valid_assignment");
                Err(GiftError::Infeasible { participants: n })
            }
        }
    }
}

/// Every valid assignment, in enumeration order.
///
/// Reference enumeration used for inspection and for checking the samplers.
/// Fails with [`GiftError::TooManyParticipants`] above [`MAX_EXHAUSTIVE_CEILING`].
pub fn valid_assignments(rules: &RuleStore) -> GiftResult<Vec<Assignment>> {
    let n = rules.len();
    if n > MAX_EXHAUSTIVE_CEILING {
        return Err(GiftError::TooManyParticipants {
            participants: n,
            ceiling: MAX_EXHAUSTIVE_CEILING,
        });
    }
    if n < 2 {
        return Ok(Vec::new());
    }

    let participants = rules.participants();
    let mut candidate = participants.to_vec();
    let mut found = Vec::new();
    for_each_permutation(&mut candidate, |perm| {
        if is_valid(participants, perm, rules) {
            found.push(Assignment::new(participants.to_vec(), perm.to_vec()));
        }
    });
    Ok(found)
}

/// Whether at least one valid assignment exists.
///
/// Runs a backtracking search that stops at the first solution.
pub fn is_feasible(rules: &RuleStore) -> bool {
    if rules.len() < 2 {
        return false;
    }
    let allowed = allowed_matrix(rules);
    backtrack(&allowed, &mut |_: &[usize]| ControlFlow::Break(())).is_break()
}

// =============================================================================
// Strategies
// =============================================================================

fn sample_exhaustive<R: Rng>(rules: &RuleStore, rng: &mut R) -> Option<Vec<Participant>> {
    let participants = rules.participants();
    let mut candidate = participants.to_vec();
    let mut seen: u64 = 0;
    let mut picked = None;

    for_each_permutation(&mut candidate, |perm| {
        if is_valid(participants, perm, rules) {
            seen += 1;
            if rng.random_range(0..seen) == 0 {
                picked = Some(perm.to_vec());
            }
        }
    });

    debug!(valid = seen, "exhaustive_enumeration_done");
    picked
}

fn sample_rejection<R: Rng>(allowed: &[Vec<bool>], budget: usize, rng: &mut R) -> Option<Vec<usize>> {
    let mut order: Vec<usize> = (0..allowed.len()).collect();
    for attempt in 0..budget {
        order.shuffle(rng);
        if order
            .iter()
            .enumerate()
            .all(|(giver, &receiver)| allowed[giver][receiver])
        {
            debug!(attempt, "rejection_sample_accepted");
            return Some(order);
        }
    }
    None
}

fn sample_backtracking<R: Rng>(allowed: &[Vec<bool>], rng: &mut R) -> Option<Vec<usize>> {
    let mut seen: u64 = 0;
    let mut picked: Option<Vec<usize>> = None;

    let _ = backtrack(allowed, &mut |receivers| {
        seen += 1;
        if rng.random_range(0..seen) == 0 {
            picked = Some(receivers.to_vec());
        }
        ControlFlow::Continue(())
    });

    debug!(valid = seen, "backtracking_search_done");
    picked
}

// =============================================================================
// Search helpers
// =============================================================================

fn resolve_indices(participants: &[Participant], indices: &[usize]) -> Vec<Participant> {
    indices.iter().map(|&idx| participants[idx].clone()).collect()
}

/// `allowed[g][r]` is true when participant `g` may give to participant `r`.
fn allowed_matrix(rules: &RuleStore) -> Vec<Vec<bool>> {
    let participants = rules.participants();
    participants
        .iter()
        .map(|giver| {
            participants
                .iter()
                .map(|receiver| rules.allows(giver.as_str(), receiver.as_str()))
                .collect()
        })
        .collect()
}

/// Depth-first walk over every permutation consistent with `allowed`.
///
/// Givers are placed most-constrained first. `visit` receives the receiver
/// index for every giver index and can stop the walk by breaking.
fn backtrack<F>(allowed: &[Vec<bool>], visit: &mut F) -> ControlFlow<()>
where
    F: FnMut(&[usize]) -> ControlFlow<()>,
{
    let n = allowed.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by_key(|&giver| allowed[giver].iter().filter(|&&ok| ok).count());

    let mut search = Backtrack {
        allowed,
        order,
        used: vec![false; n],
        receivers: vec![usize::MAX; n],
    };
    search.descend(0, visit)
}

struct Backtrack<'a> {
    allowed: &'a [Vec<bool>],
    order: Vec<usize>,
    used: Vec<bool>,
    receivers: Vec<usize>,
}

impl Backtrack<'_> {
    fn descend<F>(&mut self, depth: usize, visit: &mut F) -> ControlFlow<()>
    where
        F: FnMut(&[usize]) -> ControlFlow<()>,
    {
        if depth == self.order.len() {
            return visit(&self.receivers);
        }
        let giver = self.order[depth];
        for receiver in 0..self.allowed.len() {
            if self.used[receiver] || !self.allowed[giver][receiver] {
                continue;
            }
            self.used[receiver] = true;
            self.receivers[giver] = receiver;
            let flow = self.descend(depth + 1, visit);
            self.used[receiver] = false;
            if flow.is_break() {
                return flow;
            }
        }
        ControlFlow::Continue(())
    }
}

/// Visit every permutation of `items` in place (Heap's algorithm, iterative).
fn for_each_permutation<T, F>(items: &mut [T], mut visit: F)
where
    F: FnMut(&[T]),
{
    let n = items.len();
    let mut counters = vec![0usize; n];
    visit(items);

    let mut i = 1;
    while i < n {
        if counters[i] < i {
            if i % 2 == 0 {
                items.swap(0, i);
            } else {
                items.swap(counters[i], i);
            }
            visit(items);
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

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

    fn generator(strategy: Strategy) -> AssignmentGenerator {
        AssignmentGenerator::new(GeneratorConfig::default().with_strategy(strategy))
    }

    fn receivers(assignment: &Assignment) -> Vec<String> {
        assignment
            .receivers()
            .iter()
            .map(|p| p.as_str().to_string())
            .collect()
    }

    #[test]
    fn test_heap_visits_every_permutation_once() {
        let mut items = vec![0, 1, 2, 3];
        let mut seen = HashSet::new();
        for_each_permutation(&mut items, |perm| {
            assert!(seen.insert(perm.to_vec()), "duplicate permutation {:?}", perm);
        });
        assert_eq!(seen.len(), 24);
    }

    #[test]
    fn test_fewer_than_two_participants_is_infeasible() {
        let sampler = AssignmentGenerator::default();
        assert_eq!(
            sampler.generate(&RuleStore::new()),
            Err(GiftError::Infeasible { participants: 0 })
        );
        assert_eq!(
            sampler.generate(&rules(&["Solo"])),
            Err(GiftError::Infeasible { participants: 1 })
        );
        assert!(!is_feasible(&rules(&["Solo"])));
    }

    #[test]
    fn test_two_participants_swap() {
        let rules = rules(&["Ann", "Bob"]);
        for strategy in [Strategy::Exhaustive, Strategy::Rejection, Strategy::Auto] {
            let assignment = generator(strategy).generate(&rules).unwrap();
            assert_eq!(receivers(&assignment), vec!["Bob", "Ann"]);
        }
    }

    #[test]
    fn test_mandate_plus_reverse_restriction_is_infeasible() {
        let mut rules = rules(&["A", "B"]);
        rules.add_mandate("A", "B").unwrap();
        rules.add_restriction("B", "A").unwrap();

        for strategy in [Strategy::Exhaustive, Strategy::Rejection] {
            assert_eq!(
                generator(strategy).generate(&rules),
                Err(GiftError::Infeasible { participants: 2 })
            );
        }
        assert!(!is_feasible(&rules));
        assert!(valid_assignments(&rules).unwrap().is_empty());
    }

    #[test]
    fn test_three_participants_complete_valid_set() {
        let rules = rules(&["Ann", "Bob", "Cid"]);
        let all: HashSet<Vec<String>> = valid_assignments(&rules)
            .unwrap()
            .iter()
            .map(receivers)
            .collect();
        let expected: HashSet<Vec<String>> = [
            vec!["Bob".to_string(), "Cid".to_string(), "Ann".to_string()],
            vec!["Cid".to_string(), "Ann".to_string(), "Bob".to_string()],
        ]
        .into_iter()
        .collect();
        assert_eq!(all, expected);

        let mut rng = StdRng::seed_from_u64(7);
        for strategy in [Strategy::Exhaustive, Strategy::Rejection] {
            for _ in 0..20 {
                let assignment = generator(strategy).generate_with(&rules, &mut rng).unwrap();
                assert!(expected.contains(&receivers(&assignment)));
            }
        }
    }

    #[test]
    fn test_zero_retry_budget_falls_back_to_backtracking() {
        let mut rules = rules(&["A", "B", "C", "D"]);
        rules.add_mandate("A", "B").unwrap();
        rules.add_restriction("C", "A").unwrap();

        let sampler = AssignmentGenerator::new(
            GeneratorConfig::default()
                .with_strategy(Strategy::Rejection)
                .with_retry_budget(0),
        );
        let valid: HashSet<Vec<String>> = valid_assignments(&rules)
            .unwrap()
            .iter()
            .map(receivers)
            .collect();
        assert!(!valid.is_empty());

        let mut rng = StdRng::seed_from_u64(11);
        let mut hit = HashSet::new();
        for _ in 0..200 {
            let assignment = sampler.generate_with(&rules, &mut rng).unwrap();
            let r = receivers(&assignment);
            assert!(valid.contains(&r));
            hit.insert(r);
        }
        assert_eq!(hit, valid, "fallback search should reach every valid assignment");
    }

    #[test]
    fn test_exhaustive_above_ceiling_is_rejected() {
        let names: Vec<String> = (0..5).map(|i| format!("P{}", i)).collect();
        let mut rules = RuleStore::new();
        for name in &names {
            rules.add_participant(name.as_str()).unwrap();
        }
        let sampler = AssignmentGenerator::new(GeneratorConfig {
            strategy: Strategy::Exhaustive,
            exhaustive_ceiling: 4,
            retry_budget: DEFAULT_RETRY_BUDGET,
        });
        assert_eq!(
            sampler.generate(&rules),
            Err(GiftError::TooManyParticipants {
                participants: 5,
                ceiling: 4
            })
        );
    }

    #[test]
    fn test_auto_handles_groups_above_ceiling() {
        let mut rules = RuleStore::new();
        let names: Vec<String> = (0..12).map(|i| format!("P{}", i)).collect();
        for name in &names {
            rules.add_participant(name.as_str()).unwrap();
        }
        // Pair everyone off so the search space is narrow.
        for pair in names.chunks(2) {
            rules.add_mandate(&pair[0], &pair[1]).unwrap();
        }

        let assignment = AssignmentGenerator::default().generate(&rules).unwrap();
        assert!(assignment.satisfies(&rules));
        for pair in names.chunks(2) {
            assert_eq!(assignment.recipient_of(&pair[0]).unwrap(), pair[1].as_str());
        }
    }

    fn numbered(n: usize) -> RuleStore {
        let mut rules = RuleStore::new();
        for i in 0..n {
            rules.add_participant(format!("P{}", i)).unwrap();
        }
        rules
    }

    #[test]
    fn test_backtracking_fallback_has_participant_ceiling() {
        let rules = numbered(MAX_BACKTRACKING_PARTICIPANTS + 2);
        let sampler = AssignmentGenerator::new(
            GeneratorConfig::default()
                .with_strategy(Strategy::Rejection)
                .with_retry_budget(0),
        );
        assert_eq!(
            sampler.generate_with(&rules, &mut StdRng::seed_from_u64(5)),
            Err(GiftError::TooManyParticipants {
                participants: MAX_BACKTRACKING_PARTICIPANTS + 2,
                ceiling: MAX_BACKTRACKING_PARTICIPANTS,
            })
        );

        // At the ceiling the fallback still runs.
        let mut mandated = numbered(MAX_BACKTRACKING_PARTICIPANTS);
        for i in 0..MAX_BACKTRACKING_PARTICIPANTS {
            let next = (i + 1) % MAX_BACKTRACKING_PARTICIPANTS;
            mandated
                .add_mandate(&format!("P{}", i), &format!("P{}", next))
                .unwrap();
        }
        let assignment = sampler
            .generate_with(&mandated, &mut StdRng::seed_from_u64(5))
            .unwrap();
        assert!(assignment.satisfies(&mandated));
    }

    #[test]
    fn test_large_group_succeeds_when_a_shuffle_is_accepted() {
        let rules = numbered(40);
        let assignment = generator(Strategy::Rejection)
            .generate_with(&rules, &mut StdRng::seed_from_u64(9))
            .unwrap();
        assert!(assignment.satisfies(&rules));
    }

    #[test]
    fn test_giver_without_receiver_is_infeasible_at_any_size() {
        let mut rules = numbered(MAX_BACKTRACKING_PARTICIPANTS + 2);
        for i in 1..MAX_BACKTRACKING_PARTICIPANTS + 2 {
            rules.add_restriction("P0", &format!("P{}", i)).unwrap();
        }
        assert_eq!(
            generator(Strategy::Rejection).generate(&rules),
            Err(GiftError::Infeasible {
                participants: MAX_BACKTRACKING_PARTICIPANTS + 2
            })
        );
    }

    #[test]
    fn test_strategy_parse_and_display() {
        assert_eq!("Exhaustive".parse::<Strategy>(), Ok(Strategy::Exhaustive));
        assert_eq!("rejection".parse::<Strategy>(), Ok(Strategy::Rejection));
        assert!("greedy".parse::<Strategy>().is_err());
        assert_eq!(Strategy::Auto.to_string(), "auto");
    }
}
