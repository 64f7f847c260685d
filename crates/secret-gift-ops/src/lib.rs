//! Secret-Gift Operations Layer
//!
//! This crate wraps the assignment engine in everything a running gift
//! exchange needs: face registration and identity verification, persistence
//! in a `.gift` folder, and user configuration. Both the CLI and any other
//! host drive an exchange through [`OpsContext`].
//!
//! ## Architecture
//!
//! - **Exchange**: the aggregate of rules, session and registered faces
//! - **Requests / Responses**: typed inputs and outputs for each operation
//! - **OpsContext**: loads an exchange, applies one operation, saves it
//!
//! ## Usage
//!
//! ```rust,no_run
//! use secret_gift_ops::{Config, OpsContext, RuleRequest};
//!
//! fn main() -> anyhow::Result<()> {
//!     let ctx = OpsContext::new(Config::load()?);
//!     let root = std::path::Path::new(".");
//!
//!     ctx.init(root, false)?;
//!     ctx.add_participants(root, "Ann, Bob, Cid")?;
//!     ctx.add_rule(root, &RuleRequest::restriction("Ann", "Bob"))?;
//!     let shuffle = ctx.setup(root)?;
//!
//!     println!("Assignment #{} ready", shuffle.generation);
//!     Ok(())
//! }
//! ```

mod config;
mod context;
mod error;
mod exchange;
mod faces;
mod matcher;
mod requests;
mod responses;
mod store;

// Re-export public API
pub use config::{Config, CONFIG_FILE_ENV, CONFIG_KEYS};
pub use context::OpsContext;
pub use error::{OpsError, OpsResult};
pub use exchange::{Exchange, SharedExchange, MIN_PARTICIPANTS};
pub use faces::FaceRegistry;
pub use matcher::{FaceEncoding, FaceMatcher, PrecomputedEncodings, DEFAULT_TOLERANCE};
pub use requests::*;
pub use responses::*;
pub use store::{has_store, Manifest, Store, StoreStats, GIFT_DIR};
