//! Persistence store.
//!
//! A snapshot is a plain value: config, position, recurring registry and the
//! pending queue. It never contains driver handles; loading combines it with a
//! freshly constructed driver in [`crate::controller::Controller::restore`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{BlindsError, Result};
use crate::scheduler::{Job, RecurringJob};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub config: Config,
    pub position_ms: u64,
    #[serde(default)]
    pub recurring: Vec<RecurringJob>,
    #[serde(default)]
    pub pending: Vec<Job>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

impl Snapshot {
    pub fn new(config: Config, position_ms: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            config,
            position_ms,
            recurring: Vec::new(),
            pending: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let data = serde_json::to_vec_pretty(snapshot)?;
        crate::io::atomic_write(&self.path, &data).map_err(|e| {
            BlindsError::Persistence(format!("writing {}: {e}", self.path.display()))
        })?;
        debug!(path = %self.path.display(), "snapshot saved");
        Ok(())
    }

    /// Read the snapshot. A missing or unreadable file is not an error: the
    /// caller starts from defaults instead.
    pub fn load(&self) -> Option<Snapshot> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting fresh", self.path.display());
                return None;
            }
            Err(e) => {
                warn!("Could not read snapshot {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_slice::<Snapshot>(&data) {
            Ok(snapshot) => {
                info!(
                    "Loaded snapshot from {} (position {} ms, {} recurring)",
                    self.path.display(),
                    snapshot.position_ms,
                    snapshot.recurring.len()
                );
                Some(snapshot)
            }
            Err(e) => {
                warn!("Ignoring corrupt snapshot {}: {e}", self.path.display());
                None
            }
        }
    }
}
