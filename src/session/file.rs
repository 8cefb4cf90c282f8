//! Session persisted as JSON so the CLI keeps its sign-in across runs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use log::warn;

use super::{SessionStore, User};
use crate::runtime::Runtime;

pub struct FileSessionStore<R: Runtime> {
    runtime: R,
    path: PathBuf,
}

impl<R: Runtime> FileSessionStore<R> {
    pub fn new(runtime: R, path: PathBuf) -> Self {
        Self { runtime, path }
    }

    /// Default location under the user's config directory.
    pub fn default_path(runtime: &R) -> Option<PathBuf> {
        runtime
            .config_dir()
            .map(|dir| dir.join("portalctl").join("session.json"))
    }

    fn load(&self) -> Result<Option<User>> {
        if !self.runtime.exists(&self.path) {
            return Ok(None);
        }
        let contents = self.runtime.read_to_string(&self.path)?;
        let user = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session file {:?}", self.path))?;
        Ok(Some(user))
    }

    fn store(&self, user: &User) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            self.runtime.create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(user)?;
        self.runtime.write(&self.path, contents.as_bytes())
    }
}

impl<R: Runtime> SessionStore for FileSessionStore<R> {
    fn current(&self) -> Option<User> {
        match self.load() {
            Ok(user) => user,
            Err(e) => {
                warn!("Ignoring unreadable session file: {:#}", e);
                None
            }
        }
    }

    fn set(&self, user: User) {
        if let Err(e) = self.store(&user) {
            warn!("Failed to persist session: {:#}", e);
        }
    }

    fn clear(&self) {
        if !self.runtime.exists(&self.path) {
            return;
        }
        if let Err(e) = self.runtime.remove_file(&self.path) {
            warn!("Failed to remove session file: {:#}", e);
        }
    }
}
