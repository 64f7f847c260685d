//! Constrained assignment engine for secret gift exchanges.
//!
//! Every participant gives exactly one gift to exactly one other participant.
//! The engine turns a participant list plus two rule sets into a uniformly
//! random valid assignment, or reports that no such assignment exists.
//!
//! ## Core Concepts
//!
//! - **Participant**: an opaque, case-sensitive name, unique within an exchange
//! - **Restriction**: a forbidden giver → receiver pairing
//! - **Mandate**: a required giver → receiver pairing (at most one per giver)
//! - **Assignment**: a permutation of the participants with no fixed points that
//!   honours every restriction and mandate
//! - **Session**: the committed assignment plus per-participant verification state
//!
//! ## Data Flow
//!
//! ```text
//! RuleStore ──► validator ──► AssignmentGenerator ──► AssignmentSession
//!     ▲                              ▲                       │
//!     └──── rule edits ──────────────┴──── reshuffle ────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use secret_gift_core::{AssignmentSession, RuleStore};
//!
//! let mut rules = RuleStore::new();
//! for name in ["Ann", "Bob", "Cid"] {
//!     rules.add_participant(name).unwrap();
//! }
//! rules.add_restriction("Ann", "Bob").unwrap();
//!
//! let mut session = AssignmentSession::default();
//! session.reshuffle(&rules).unwrap();
//! assert_eq!(session.current_recipient("Ann").unwrap().as_str(), "Cid");
//! ```

mod assignment;
mod error;
pub mod generator;
mod participant;
mod rules;
mod session;
pub mod validator;

pub use assignment::{Assignment, AssignmentData};
pub use error::{GiftError, GiftResult};
pub use generator::{
    is_feasible, valid_assignments, AssignmentGenerator, GeneratorConfig, Strategy,
    DEFAULT_EXHAUSTIVE_CEILING, DEFAULT_RETRY_BUDGET, MAX_BACKTRACKING_PARTICIPANTS,
    MAX_EXHAUSTIVE_CEILING,
};
pub use participant::Participant;
pub use rules::{RuleStore, RuleStoreData};
pub use session::AssignmentSession;
pub use validator::is_valid;
