//! OpsContext - The main service for executing operations.
//!
//! The OpsContext holds configuration plus the face matcher and runs every
//! exchange operation against a `.gift` store. Each mutating call loads the
//! exchange, applies one change and saves it only if the change succeeded.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secret_gift_core::{GiftError, Participant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{OpsError, OpsResult};
use crate::exchange::Exchange;
use crate::matcher::{FaceMatcher, PrecomputedEncodings};
use crate::requests::*;
use crate::responses::*;
use crate::store::Store;

/// The main operations context.
#[derive(Clone)]
pub struct OpsContext {
    /// Configuration for operations.
    pub config: Config,

    matcher: Arc<dyn FaceMatcher>,
}

impl fmt::Debug for OpsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpsContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OpsContext {
    /// Create a new OpsContext that treats images as precomputed encodings.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            matcher: Arc::new(PrecomputedEncodings),
        }
    }

    /// Create a new OpsContext with default configuration.
    pub fn default_config() -> OpsResult<Self> {
        Ok(Self::new(Config::load()?))
    }

    /// Use a different face matcher.
    pub fn with_matcher(mut self, matcher: Arc<dyn FaceMatcher>) -> Self {
        self.matcher = matcher;
        self
    }

    /// The face matcher in use.
    pub fn matcher(&self) -> &dyn FaceMatcher {
        self.matcher.as_ref()
    }

    // =========================================================================
    // Store access
    // =========================================================================

    /// Create the `.gift` store. With `force`, an existing exchange is wiped.
    pub fn init(&self, root: &Path, force: bool) -> OpsResult<InitResponse> {
        let store = Store::new(root);
        if store.exists() && !force {
            debug!(path = %root.display(), "Exchange already initialized");
            return Ok(InitResponse {
                path: root.to_path_buf(),
                created: false,
            });
        }

        store.clean()?;
        store.init()?;
        store.save(&Exchange::new(self.config.generator()))?;
        info!(path = %root.display(), "Initialized exchange");

        Ok(InitResponse {
            path: root.to_path_buf(),
            created: true,
        })
    }

    /// Load the exchange stored at `root`.
    pub fn open(&self, root: &Path) -> OpsResult<Exchange> {
        let store = Store::new(root);
        store.require()?;

        let mut exchange = store.load()?.unwrap_or_default();
        exchange.set_generator(self.config.generator());
        Ok(exchange)
    }

    /// Load, apply `op`, and save when it succeeds.
    pub fn with_exchange<T>(
        &self,
        root: &Path,
        op: impl FnOnce(&mut Exchange) -> OpsResult<T>,
    ) -> OpsResult<T> {
        let mut exchange = self.open(root)?;
        let value = op(&mut exchange)?;
        Store::new(root).save(&exchange)?;
        Ok(value)
    }

    // =========================================================================
    // Participants and rules
    // =========================================================================

    /// Add every new name from a comma-separated list.
    pub fn add_participants(&self, root: &Path, names: &str) -> OpsResult<ParticipantsResponse> {
        self.with_exchange(root, |ex| {
            let changed = ex.add_participants_csv(names);
            if changed.is_empty() {
                warn!(input = names, "No new participants added");
            }
            Ok(ParticipantsResponse {
                changed,
                participants: ex.rules().participants().to_vec(),
            })
        })
    }

    /// Rename a participant everywhere.
    pub fn rename_participant(
        &self,
        root: &Path,
        old: &str,
        new: &str,
    ) -> OpsResult<ParticipantsResponse> {
        self.with_exchange(root, |ex| {
            let renamed = ex.rename_participant(old, new)?;
            Ok(ParticipantsResponse {
                changed: vec![renamed],
                participants: ex.rules().participants().to_vec(),
            })
        })
    }

    /// Remove a participant with their rules and face.
    pub fn remove_participant(&self, root: &Path, name: &str) -> OpsResult<ParticipantsResponse> {
        self.with_exchange(root, |ex| {
            let removed = ex.remove_participant(name)?;
            Ok(ParticipantsResponse {
                changed: vec![removed],
                participants: ex.rules().participants().to_vec(),
            })
        })
    }

    /// Add a restriction or mandate.
    pub fn add_rule(&self, root: &Path, request: &RuleRequest) -> OpsResult<RuleResponse> {
        self.with_exchange(root, |ex| {
            let changed = match request.kind {
                RuleKind::Restriction => ex.add_restriction(&request.giver, &request.receiver)?,
                RuleKind::Mandate => ex.add_mandate(&request.giver, &request.receiver)?,
            };
            Ok(rule_response(request, changed))
        })
    }

    /// Remove a restriction or mandate. Absent rules are a no-op.
    pub fn remove_rule(&self, root: &Path, request: &RuleRequest) -> OpsResult<RuleResponse> {
        self.with_exchange(root, |ex| {
            let changed = match request.kind {
                RuleKind::Restriction => ex.remove_restriction(&request.giver, &request.receiver),
                RuleKind::Mandate => {
                    let current = ex.rules().mandate_for(&request.giver);
                    if current.is_some_and(|r| *r == request.receiver.as_str()) {
                        ex.remove_mandate(&request.giver).is_some()
                    } else {
                        false
                    }
                }
            };
            Ok(rule_response(request, changed))
        })
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Complete setup and generate the first assignment.
    pub fn setup(&self, root: &Path) -> OpsResult<ShuffleResponse> {
        self.with_exchange(root, |ex| {
            ex.complete_setup()?;
            Ok(shuffle_response(ex))
        })
    }

    /// Discard the assignment and verification, then draw again.
    pub fn shuffle(&self, root: &Path) -> OpsResult<ShuffleResponse> {
        self.with_exchange(root, |ex| {
            ex.reshuffle()?;
            Ok(shuffle_response(ex))
        })
    }

    /// Store a participant's face.
    pub fn register(&self, root: &Path, request: &RegisterRequest) -> OpsResult<RegisterResponse> {
        self.with_exchange(root, |ex| {
            if !ex.rules().contains(&request.name) {
                return Err(GiftError::unknown(request.name.as_str()).into());
            }
            let encoding = request
                .face
                .encode(self.matcher())
                .ok_or(OpsError::NoFaceDetected)?;
            ex.register_face(&request.name, encoding)?;
            Ok(RegisterResponse {
                name: Participant::from(request.name.as_str()),
                registered_faces: ex.faces().len(),
            })
        })
    }

    /// Verify the caller's face and reveal their recipient.
    pub fn reveal(&self, root: &Path, request: &RevealRequest) -> OpsResult<RevealResponse> {
        let tolerance = self.config.match_tolerance;
        self.with_exchange(root, |ex| {
            // Unknown names are reported before image problems.
            if !ex.rules().contains(&request.name) {
                return Err(GiftError::unknown(request.name.as_str()).into());
            }
            let probe = request
                .probe
                .encode(self.matcher())
                .ok_or(OpsError::NoFaceDetected)?;
            let recipient = ex.verify(&request.name, &probe, self.matcher(), tolerance)?;
            Ok(RevealResponse {
                name: Participant::from(request.name.as_str()),
                recipient,
            })
        })
    }

    /// Report participants, rules and store state.
    pub fn status(&self, root: &Path) -> OpsResult<StatusResponse> {
        let ex = self.open(root)?;
        let stats = Store::new(root).stats()?;
        let rules = ex.rules();

        let participants = rules
            .participants()
            .iter()
            .map(|name| ParticipantStatus {
                name: name.clone(),
                restrictions: rules
                    .restrictions_for(name.as_str())
                    .map(|set| set.iter().cloned().collect())
                    .unwrap_or_default(),
                mandate: rules.mandate_for(name.as_str()).cloned(),
                registered: ex.faces().is_registered(name.as_str()),
                verified: ex.is_verified(name.as_str()),
            })
            .collect();

        Ok(StatusResponse {
            path: root.to_path_buf(),
            setup_complete: ex.is_setup_complete(),
            has_assignment: ex.session().has_assignment(),
            generation: ex.session().generation(),
            rule_count: rules.rule_count(),
            participants,
            manifest: stats.manifest,
            backup_count: stats.backup_count,
            store_size: stats.total_size,
        })
    }

    /// Drop all participants, rules, faces and the assignment.
    pub fn reset(&self, root: &Path) -> OpsResult<()> {
        self.with_exchange(root, |ex| {
            ex.reset();
            Ok(())
        })
    }

    // =========================================================================
    // Face data backups
    // =========================================================================

    /// Write a face-data backup to `dir`, the configured backup dir, or `.gift/backups`.
    pub fn export_faces(&self, root: &Path, dir: Option<&Path>) -> OpsResult<ExportResponse> {
        let ex = self.open(root)?;
        let dir: Option<PathBuf> = dir
            .map(Path::to_path_buf)
            .or_else(|| self.config.backup_dir.clone());
        let path = Store::new(root).export_faces(ex.faces(), dir.as_deref())?;
        Ok(ExportResponse {
            path,
            faces: ex.faces().len(),
        })
    }

    /// Replace registered faces with those from a backup.
    pub fn import_faces(&self, root: &Path, path: &Path) -> OpsResult<ImportResponse> {
        let faces = Store::new(root).import_faces(path)?;
        self.with_exchange(root, |ex| {
            let dropped = ex.replace_faces(faces);
            if !dropped.is_empty() {
                warn!(count = dropped.len(), "Skipped faces of unknown participants");
            }
            Ok(ImportResponse {
                path: path.to_path_buf(),
                imported: ex.faces().len(),
                dropped,
            })
        })
    }

    /// Backups in `.gift/backups`, newest first.
    pub fn list_backups(&self, root: &Path) -> OpsResult<Vec<PathBuf>> {
        let store = Store::new(root);
        store.require()?;
        store.list_backups()
    }
}

fn rule_response(request: &RuleRequest, changed: bool) -> RuleResponse {
    RuleResponse {
        kind: request.kind,
        giver: Participant::from(request.giver.as_str()),
        receiver: Participant::from(request.receiver.as_str()),
        changed,
    }
}

fn shuffle_response(ex: &Exchange) -> ShuffleResponse {
    ShuffleResponse {
        participants: ex.rules().len(),
        generation: ex.session().generation(),
    }
}
