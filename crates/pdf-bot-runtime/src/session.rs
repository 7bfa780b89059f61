//! Per-user staging of uploaded files
//!
//! A session is the ordered list of files a user has uploaded but not yet
//! consumed by an action. Sessions live in memory only. Each user's session
//! sits behind its own async mutex, so uploads and actions from one user
//! are serialized while different users proceed in parallel.

use pdf_ops::FileKind;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Messaging-platform user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(
        "You already have {max} files staged. Run an action or clear your files before uploading more."
    )]
    TooManyFiles { max: usize },
    #[error("That file is too large ({}). The limit is {}.", format_size(*size), format_size(*max))]
    FileTooLarge { size: u64, max: u64 },
}

/// Ceilings applied to every session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionLimits {
    pub max_files: usize,
    pub max_file_bytes: u64,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_files: 20,
            // Largest file the Bot API lets a bot download
            max_file_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Files staged by one user, in upload order
#[derive(Debug, Default)]
pub struct Session {
    files: Vec<PathBuf>,
    limits: SessionLimits,
}

impl Session {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            files: Vec::new(),
            limits,
        }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Check whether one more file of `size` bytes (if known) may be staged.
    pub fn ensure_capacity(&self, size: Option<u64>) -> Result<(), SessionError> {
        if self.files.len() >= self.limits.max_files {
            return Err(SessionError::TooManyFiles {
                max: self.limits.max_files,
            });
        }
        match size {
            Some(size) if size > self.limits.max_file_bytes => Err(SessionError::FileTooLarge {
                size,
                max: self.limits.max_file_bytes,
            }),
            _ => Ok(()),
        }
    }

    /// Append a staged file. Duplicates are kept.
    pub fn record(&mut self, path: PathBuf) -> Result<(), SessionError> {
        self.ensure_capacity(None)?;
        self.files.push(path);
        Ok(())
    }

    /// Staged files of `kind`, in upload order
    pub fn snapshot(&self, kind: FileKind) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|path| kind.matches(path))
            .cloned()
            .collect()
    }

    /// Most recently staged file of `kind`
    pub fn latest(&self, kind: FileKind) -> Option<&Path> {
        self.files
            .iter()
            .rev()
            .find(|path| kind.matches(path))
            .map(PathBuf::as_path)
    }

    /// Delete every staged file and empty the session.
    ///
    /// Best effort: a file that cannot be removed is logged and skipped.
    /// Returns the number of files actually deleted.
    pub async fn clear(&mut self) -> usize {
        let mut deleted = 0;
        for path in self.files.drain(..) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => deleted += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    log::debug!("Staged file already gone: {}", path.display());
                }
                Err(e) => log::warn!("Error deleting file {}: {}", path.display(), e),
            }
        }
        deleted
    }
}

/// Exclusive access to one user's session
pub type SessionGuard = OwnedMutexGuard<Session>;

/// Process-wide map from user to session
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Arc<AsyncMutex<Session>>>>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            limits,
        }
    }

    pub fn limits(&self) -> SessionLimits {
        self.limits
    }

    /// Number of users with a session entry
    pub fn user_count(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn entry(&self, user: UserId) -> Arc<AsyncMutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions
            .entry(user)
            .or_insert_with(|| Arc::new(AsyncMutex::new(Session::new(self.limits))))
            .clone()
    }

    /// Lock a user's session, creating it if absent.
    ///
    /// Holding the guard serializes every other operation for that user.
    pub async fn lock(&self, user: UserId) -> SessionGuard {
        self.entry(user).lock_owned().await
    }

    /// Drop the entry for `user` if its session is empty and nobody else
    /// holds or waits on it. Call after the guard has been dropped.
    pub fn release(&self, user: UserId) -> bool {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(entry) = sessions.get(&user) else {
            return false;
        };
        if Arc::strong_count(entry) > 1 {
            return false;
        }
        let idle = entry.try_lock().is_ok_and(|session| session.is_empty());
        if idle {
            sessions.remove(&user);
        }
        idle
    }

    pub async fn record(&self, user: UserId, path: PathBuf) -> Result<(), SessionError> {
        let result = self.lock(user).await.record(path);
        self.release(user);
        result
    }

    pub async fn snapshot(&self, user: UserId, kind: FileKind) -> Vec<PathBuf> {
        let files = self.lock(user).await.snapshot(kind);
        self.release(user);
        files
    }

    pub async fn clear(&self, user: UserId) -> usize {
        let cleared = self.lock(user).await.clear().await;
        self.release(user);
        cleared
    }

    /// Start over: drop anything staged and forget the session.
    pub async fn reset(&self, user: UserId) -> usize {
        let cleared = self.clear(user).await;
        log::info!("Session reset for user {} ({} files removed)", user, cleared);
        cleared
    }

    /// Clear every session and drop the idle entries. Used on shutdown.
    pub async fn clear_all(&self) -> usize {
        let sessions: Vec<_> = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(user, session)| (*user, session.clone()))
            .collect();

        let mut deleted = 0;
        for (user, session) in sessions {
            deleted += session.lock().await.clear().await;
            drop(session);
            self.release(user);
        }
        deleted
    }
}

/// Human-readable byte size
pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
