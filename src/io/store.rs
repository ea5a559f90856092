//! Saved car position persistence
//!
//! The reference position is kept as a single JSON document so it survives
//! restarts. The tracker never touches this file; the application service
//! reads it at startup and writes it when the user commits a position.

use crate::domain::types::PositionSample;
use anyhow::Context;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct ReferenceStore {
    path: PathBuf,
}

impl ReferenceStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the saved position. A missing file is `Ok(None)`.
    pub fn load(&self) -> anyhow::Result<Option<PositionSample>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "reference_store_empty");
                return Ok(None);
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let sample: PositionSample = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            coordinate = %sample.coordinate,
            "reference_loaded"
        );
        Ok(Some(sample))
    }

    /// Persist the position, replacing any previous one
    pub fn save(&self, sample: &PositionSample) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        let json = serde_json::to_string_pretty(sample)?;
        // Write-then-rename so a crash never leaves a half-written file
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        info!(path = %self.path.display(), coordinate = %sample.coordinate, "reference_saved");
        Ok(())
    }

    /// Forget the saved position. Clearing an empty store is not an error.
    pub fn clear(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "reference_cleared");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "reference_clear_failed");
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}
