//! Session token storage.
//!
//! A session is the access/refresh token pair handed out by the backend at
//! login. It is persisted in `<base>/session.json` with restricted
//! permissions (0600). Tokens are never logged or displayed in full.
//!
//! Both tokens are written and cleared together; the only partial update is
//! [`SessionStore::set_access`], used after a refresh.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::paths;

/// The token pair representing an authenticated client.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// The access token (short-lived)
    pub access: String,
    /// The refresh token (long-lived)
    pub refresh: String,
}

impl Session {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: access.into(),
            refresh: refresh.into(),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("access", &mask_token(&self.access))
            .field("refresh", &mask_token(&self.refresh))
            .finish()
    }
}

/// Session lifecycle notifications.
///
/// `ReauthRequired` means a refresh failed and the session was torn down;
/// front ends should route the user to a login surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    Refreshed,
    SignedOut,
    ReauthRequired,
}

/// Masks a token for display.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 16 {
        return "***".to_string();
    }
    let prefix: String = token.chars().take(12).collect();
    format!("{prefix}...")
}

/// Storage for the single active session.
///
/// Implementations must make each mutation atomic with respect to other
/// mutations on the same store.
pub trait SessionStore: Send + Sync {
    /// Returns the stored session, if any.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<Session>>;

    /// Replaces the stored session.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, session: &Session) -> Result<()>;

    /// Replaces the access token, keeping the refresh token.
    ///
    /// # Errors
    /// Returns an error if there is no session or storage fails.
    fn set_access(&self, access: &str) -> Result<()>;

    /// Removes the session. Returns true if one existed.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be modified.
    fn clear(&self) -> Result<bool>;

    /// Convenience accessor for the current access token.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn access_token(&self) -> Result<Option<String>> {
        Ok(self.load()?.map(|s| s.access))
    }
}

/// File-backed session store (`session.json`).
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store at the default location under `BIZDESK_HOME`.
    pub fn default_location() -> Self {
        Self::new(paths::session_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<Session>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read session from {}", self.path.display())
                });
            }
        };

        let session = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))?;
        Ok(Some(session))
    }

    /// Writes to a sibling temp file and renames it over `session.json`, so
    /// readers see either the old or the new session, never a partial file.
    fn write(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(session).context("Failed to serialize session")?;
        let tmp_path = self.path.with_extension("json.tmp");

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&tmp_path)
                .with_context(|| format!("Failed to open {} for writing", tmp_path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&tmp_path, contents)
                .with_context(|| format!("Failed to write to {}", tmp_path.display()))?;
        }

        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>> {
        self.read()
    }

    fn save(&self, session: &Session) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.write(session)
    }

    fn set_access(&self, access: &str) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut session = self
            .read()?
            .ok_or_else(|| anyhow::anyhow!("No session to update"))?;
        session.access = access.to_string();
        self.write(&session)
    }

    fn clear(&self) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove {}", self.path.display()))
            }
        }
    }
}

/// In-memory session store; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>> {
        Ok(self
            .inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn save(&self, session: &Session) -> Result<()> {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
        Ok(())
    }

    fn set_access(&self, access: &str) -> Result<()> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let session = guard
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("No session to update"))?;
        session.access = access.to_string();
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        Ok(self
            .inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some())
    }
}
