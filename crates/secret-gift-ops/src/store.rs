//! Persistence layer using `.gift` folder.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{OpsError, OpsResult};
use crate::exchange::Exchange;
use crate::faces::FaceRegistry;

/// Name of the persistence folder.
pub const GIFT_DIR: &str = ".gift";

const MANIFEST_FILE: &str = "manifest.json";
const EXCHANGE_FILE: &str = "exchange.json";
const FACE_DATA_FILE: &str = "face_data.json";
const BACKUPS_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "face_data_backup_";

/// Summary of the persisted exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Version of the manifest format.
    pub version: u32,

    /// Number of participants.
    pub participants: usize,

    /// Number of restrictions plus mandates.
    pub rules: usize,

    /// Whether setup was completed.
    pub setup_complete: bool,

    /// Whether an assignment is committed.
    pub has_assignment: bool,

    /// Number of successful reshuffles.
    pub generation: u64,

    /// Number of registered faces.
    pub registered_faces: usize,

    /// Timestamp of the last save.
    pub last_saved: SystemTime,
}

impl Manifest {
    /// Create a manifest describing an exchange.
    pub fn from_exchange(exchange: &Exchange) -> Self {
        Self {
            version: 1,
            participants: exchange.rules().len(),
            rules: exchange.rules().rule_count(),
            setup_complete: exchange.is_setup_complete(),
            has_assignment: exchange.session().has_assignment(),
            generation: exchange.session().generation(),
            registered_faces: exchange.faces().len(),
            last_saved: SystemTime::now(),
        }
    }
}

/// Store manages the `.gift` folder and persistence operations.
#[derive(Debug, Clone)]
pub struct Store {
    /// Root path of the exchange.
    root: PathBuf,

    /// Path to the `.gift` directory.
    gift_dir: PathBuf,
}

impl Store {
    /// Create a new store for the given root.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let gift_dir = root.join(GIFT_DIR);
        Self { root, gift_dir }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the path to the `.gift` directory.
    pub fn gift_dir(&self) -> &Path {
        &self.gift_dir
    }

    /// Default directory for face-data backups.
    pub fn backups_dir(&self) -> PathBuf {
        self.gift_dir.join(BACKUPS_DIR)
    }

    /// Check if the `.gift` directory exists.
    pub fn exists(&self) -> bool {
        self.gift_dir.exists()
    }

    /// Fail with [`OpsError::StoreNotFound`] unless the store exists.
    pub fn require(&self) -> OpsResult<()> {
        if !self.exists() {
            return Err(OpsError::StoreNotFound {
                path: self.root.clone(),
            });
        }
        Ok(())
    }

    /// Initialize the `.gift` directory structure.
    pub fn init(&self) -> OpsResult<()> {
        if !self.gift_dir.exists() {
            std::fs::create_dir_all(&self.gift_dir)?;
            debug!(path = %self.gift_dir.display(), "Created .gift directory");
        }

        let backups_dir = self.backups_dir();
        if !backups_dir.exists() {
            std::fs::create_dir_all(&backups_dir)?;
        }

        Ok(())
    }

    /// Save an exchange, its face data and a fresh manifest.
    pub fn save(&self, exchange: &Exchange) -> OpsResult<()> {
        self.init()?;

        let exchange_path = self.gift_dir.join(EXCHANGE_FILE);
        let json = serde_json::to_string_pretty(exchange)?;
        std::fs::write(&exchange_path, json)?;

        self.save_faces(exchange.faces())?;
        self.save_manifest(&Manifest::from_exchange(exchange))?;

        info!(
            path = %self.gift_dir.display(),
            participants = exchange.rules().len(),
            faces = exchange.faces().len(),
            "Saved exchange to .gift"
        );

        Ok(())
    }

    /// Load the exchange from the store.
    ///
    /// Face data is attached and the restored state re-validated: an
    /// assignment that no longer fits the rules is dropped.
    pub fn load(&self) -> OpsResult<Option<Exchange>> {
        let exchange_path = self.gift_dir.join(EXCHANGE_FILE);

        if !exchange_path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&exchange_path)?;
        let mut exchange: Exchange = serde_json::from_str(&json)?;

        let dropped = exchange.replace_faces(self.load_faces()?);
        if !dropped.is_empty() {
            warn!(count = dropped.len(), "Ignoring face data for unknown participants");
        }
        exchange.revalidate();

        info!(
            path = %exchange_path.display(),
            participants = exchange.rules().len(),
            "Loaded exchange from .gift"
        );

        Ok(Some(exchange))
    }

    /// Save the manifest to the store.
    pub fn save_manifest(&self, manifest: &Manifest) -> OpsResult<()> {
        self.init()?;

        let manifest_path = self.gift_dir.join(MANIFEST_FILE);
        let manifest_json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&manifest_path, &manifest_json)?;

        debug!(path = %manifest_path.display(), "Saved manifest");
        Ok(())
    }

    /// Load the manifest from the store.
    pub fn load_manifest(&self) -> OpsResult<Option<Manifest>> {
        let manifest_path = self.gift_dir.join(MANIFEST_FILE);

        if !manifest_path.exists() {
            return Ok(None);
        }

        let json = std::fs::read_to_string(&manifest_path)?;
        let manifest: Manifest = serde_json::from_str(&json)?;

        Ok(Some(manifest))
    }

    /// Write the face-data file.
    pub fn save_faces(&self, faces: &FaceRegistry) -> OpsResult<()> {
        self.init()?;
        let path = self.gift_dir.join(FACE_DATA_FILE);
        std::fs::write(&path, serde_json::to_string(faces)?)?;
        debug!(path = %path.display(), faces = faces.len(), "Saved face data");
        Ok(())
    }

    /// Read the face-data file.
    ///
    /// A missing file yields an empty registry; an empty or corrupt file is an error.
    pub fn load_faces(&self) -> OpsResult<FaceRegistry> {
        let path = self.gift_dir.join(FACE_DATA_FILE);
        if !path.exists() {
            return Ok(FaceRegistry::new());
        }
        read_face_file(&path)
    }

    /// Write a timestamped face-data backup and return its path.
    ///
    /// Backups go to `dir` when given, otherwise to `.gift/backups`.
    pub fn export_faces(&self, faces: &FaceRegistry, dir: Option<&Path>) -> OpsResult<PathBuf> {
        let dir = match dir {
            Some(dir) => dir.to_path_buf(),
            None => {
                self.init()?;
                self.backups_dir()
            }
        };
        std::fs::create_dir_all(&dir)?;

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut path = dir.join(format!("{}{}.json", BACKUP_PREFIX, timestamp));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{}{}_{}.json", BACKUP_PREFIX, timestamp, suffix));
            suffix += 1;
        }

        std::fs::write(&path, serde_json::to_string(faces)?)?;
        info!(path = %path.display(), faces = faces.len(), "Exported face data");
        Ok(path)
    }

    /// Read face data from a backup (or any face-data file).
    pub fn import_faces(&self, path: &Path) -> OpsResult<FaceRegistry> {
        let faces = read_face_file(path)?;
        info!(path = %path.display(), faces = faces.len(), "Imported face data");
        Ok(faces)
    }

    /// List backups in `.gift/backups`, newest first.
    pub fn list_backups(&self) -> OpsResult<Vec<PathBuf>> {
        let backups_dir = self.backups_dir();

        if !backups_dir.exists() {
            return Ok(vec![]);
        }

        let mut backups: Vec<PathBuf> = std::fs::read_dir(&backups_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        // Sort by filename (timestamp) descending
        backups.sort_by(|a, b| b.cmp(a));

        Ok(backups)
    }

    /// Clean up the `.gift` directory.
    pub fn clean(&self) -> OpsResult<()> {
        if self.gift_dir.exists() {
            std::fs::remove_dir_all(&self.gift_dir)?;
            info!(path = %self.gift_dir.display(), "Removed .gift directory");
        }
        Ok(())
    }

    /// Get storage statistics.
    pub fn stats(&self) -> OpsResult<StoreStats> {
        if !self.exists() {
            return Ok(StoreStats::default());
        }

        let manifest = self.load_manifest()?;
        let backups = self.list_backups()?;

        // Calculate total size of .gift directory
        let total_size = WalkDir::new(&self.gift_dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum();

        Ok(StoreStats {
            exists: true,
            manifest,
            backup_count: backups.len(),
            total_size,
        })
    }
}

/// Statistics about the store.
#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    /// Whether the store exists.
    pub exists: bool,
    /// Loaded manifest if available.
    pub manifest: Option<Manifest>,
    /// Number of face-data backups.
    pub backup_count: usize,
    /// Total size of .gift directory in bytes.
    pub total_size: u64,
}

fn read_face_file(path: &Path) -> OpsResult<FaceRegistry> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Check if a `.gift` directory exists at the given path.
pub fn has_store(path: &Path) -> bool {
    path.join(GIFT_DIR).exists()
}
