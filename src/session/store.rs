use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::tprintln;

use super::model::{Credentials, PersistedSession, Role};

#[derive(Debug, Default)]
struct StoreInner {
    creds: Option<Credentials>,
    /// Bumped on every establish/clear; refresh results carry the value they started under.
    generation: u64,
}

/// Process-wide session credentials, optionally persisted to a JSON file so a
/// restart resumes the session.
///
/// All mutations go through `establish`, `apply_refreshed_token` and `clear`.
/// The file is rewritten while the write lock is held so disk order matches
/// memory order.
#[derive(Debug)]
pub struct SessionStore {
    inner: RwLock<StoreInner>,
    path: Option<PathBuf>,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self { inner: RwLock::new(StoreInner::default()), path: None }
    }

    /// Open a file-backed store. A missing file starts anonymous; a file holding
    /// only one of the two tokens is discarded.
    pub fn open(path: impl Into<PathBuf>) -> SessionResult<Self> {
        let path = path.into();
        let creds = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedSession>(&bytes) {
                Ok(p) => {
                    let c = p.into_credentials();
                    if c.is_none() {
                        warn!(target: "session", path = %path.display(), "discarding incomplete persisted session");
                        remove_file_quiet(&path);
                    }
                    c
                }
                Err(e) => {
                    warn!(target: "session", path = %path.display(), error = %e, "unreadable session file; starting anonymous");
                    remove_file_quiet(&path);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        debug!(target: "session", path = %path.display(), restored = creds.is_some(), "session store opened");
        Ok(Self { inner: RwLock::new(StoreInner { creds, generation: 0 }), path: Some(path) })
    }

    pub fn path(&self) -> Option<&Path> { self.path.as_deref() }

    /// Install credentials from a login exchange. Returns the new generation.
    pub fn establish(&self, creds: Credentials) -> SessionResult<u64> {
        let mut w = self.inner.write();
        if let Some(p) = &self.path {
            write_atomic(p, &PersistedSession::from(&creds))?;
        }
        tprintln!("session.establish user={} role={}", creds.user_id, creds.role);
        w.creds = Some(creds);
        w.generation += 1;
        Ok(w.generation)
    }

    /// The single mutation point for a renewed access token, shared by the
    /// reactive 401 path and the explicit continue-session path. Rejected when
    /// the session was cleared or replaced after the refresh started.
    pub fn apply_refreshed_token(&self, started_under: u64, access_token: String) -> SessionResult<()> {
        let mut w = self.inner.write();
        if w.generation != started_under {
            return Err(SessionError::refresh("session changed while refreshing"));
        }
        let Some(current) = w.creds.as_ref() else {
            return Err(SessionError::refresh("no session to refresh"));
        };
        let renewed = Credentials { access_token, ..current.clone() };
        // disk first: a failed write leaves memory and file on the old token
        if let Some(p) = &self.path {
            write_atomic(p, &PersistedSession::from(&renewed))?;
        }
        w.creds = Some(renewed);
        debug!(target: "session", generation = w.generation, "access token renewed");
        Ok(())
    }

    /// Drop every field. Returns true if a session was present.
    pub fn clear(&self) -> bool {
        self.clear_generation(None).map(|(had, _)| had).unwrap_or(false)
    }

    /// Clear only while the store is still at `expected` (any generation when
    /// `None`). Returns whether a session was present and the new generation,
    /// or `None` when the session already changed.
    pub fn clear_generation(&self, expected: Option<u64>) -> Option<(bool, u64)> {
        let mut w = self.inner.write();
        if expected.is_some_and(|g| g != w.generation) {
            return None;
        }
        let had = w.creds.take().is_some();
        w.generation += 1;
        if let Some(p) = &self.path {
            remove_file_quiet(p);
        }
        Some((had, w.generation))
    }

    pub fn generation(&self) -> u64 { self.inner.read().generation }

    /// Access token and the generation it belongs to, read together.
    pub fn access_token_at(&self) -> (Option<String>, u64) {
        let r = self.inner.read();
        (r.creds.as_ref().map(|c| c.access_token.clone()), r.generation)
    }

    pub fn snapshot(&self) -> Option<Credentials> { self.inner.read().creds.clone() }

    pub fn access_token(&self) -> Option<String> {
        self.inner.read().creds.as_ref().map(|c| c.access_token.clone())
    }

    /// An empty stored refresh token counts as absent.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.read().creds.as_ref().map(|c| c.refresh_token.clone()).filter(|t| !t.is_empty())
    }

    /// Role of the current session; `None` when anonymous.
    pub fn role(&self) -> Option<Role> { self.inner.read().creds.as_ref().map(|c| c.role) }

    pub fn user_id(&self) -> Option<String> { self.inner.read().creds.as_ref().map(|c| c.user_id.clone()) }

    pub fn is_authenticated(&self) -> bool { self.inner.read().creds.is_some() }
}

fn write_atomic(path: &Path, value: &PersistedSession) -> SessionResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() { std::fs::create_dir_all(dir)?; }
    }
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| SessionError::storage(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

fn remove_file_quiet(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(target: "session", path = %path.display(), error = %e, "could not remove session file");
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
