//! Persists the signed-in session (token and profile) between runs.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fluxer_core::Session;

const SESSION_FILE: &str = "session.json";

pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// Store under `dir`, e.g. the fluxer config directory
    pub fn in_dir(dir: &Path) -> Self {
        Self { path: dir.join(SESSION_FILE) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let session = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, raw)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }

    /// Forget the session; returns whether there was one
    pub fn clear(&self) -> Result<bool> {
        if !self.path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.path)
            .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        Ok(true)
    }
}
