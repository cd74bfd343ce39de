//! Session state for the console user.
//!
//! SYSTEM CONTEXT
//! ==============
//! The navigation guard reads and mutates the session only through
//! [`SessionAccessor`]; the concrete [`SessionStore`] pairs a
//! [`ProfileSource`] (the backend) with a [`SessionStorage`] (where the
//! credential and the post-login redirect outlive the process).
//!
//! LIFECYCLE
//! =========
//! Created at start with the token read from storage and no identity. A
//! token without identity is the transient "not yet hydrated" state; the
//! guard resolves it before deciding anything. Logout clears both, in memory
//! and in storage.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::net::api::ApiError;
use crate::net::types::UserProfile;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("no stored credential")]
    NoCredential,

    #[error("credential changed while the profile was loading")]
    Superseded,

    #[error("current user fetch failed: {0}")]
    Fetch(#[from] ApiError),

    #[error("session storage I/O failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

// =============================================================================
// SESSION
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    /// Opaque bearer credential.
    pub token: Option<String>,
    /// Present only after a successful profile load.
    pub user: Option<UserProfile>,
}

impl Session {
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token.is_some() && self.user.is_some()
    }

    /// Meaningful only once identity is loaded; false before that.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role.is_admin())
    }

    #[must_use]
    pub fn needs_hydration(&self) -> bool {
        self.token.is_some() && self.user.is_none()
    }
}

// =============================================================================
// SEAMS
// =============================================================================

/// Where the current-user profile comes from.
#[async_trait::async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch the profile behind `token`.
    ///
    /// # Errors
    ///
    /// Any [`ApiError`]; callers treat every failure as an invalid credential.
    async fn current_user(&self, token: &str) -> Result<UserProfile, ApiError>;
}

/// What the navigation guard may do with the session.
#[async_trait::async_trait]
pub trait SessionAccessor: Send + Sync {
    fn snapshot(&self) -> Session;

    /// Load identity for the stored credential.
    ///
    /// # Errors
    ///
    /// [`SessionError::NoCredential`] without a token,
    /// [`SessionError::Superseded`] when the credential changed before the
    /// profile arrived, otherwise whatever the profile fetch failed with.
    async fn hydrate(&self) -> Result<(), SessionError>;

    /// Forget credential and identity.
    fn logout(&self);
}

/// Persistence for the credential and the post-login redirect.
///
/// The token lives as long as the storage does; the redirect is a one-shot
/// value that the login flow consumes with [`SessionStorage::take_redirect`].
pub trait SessionStorage: Send + Sync {
    fn load_token(&self) -> Option<String>;

    /// # Errors
    ///
    /// Storage write failures.
    fn save_token(&self, token: Option<&str>) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Storage write failures.
    fn remember_redirect(&self, full_path: &str) -> Result<(), SessionError>;

    fn peek_redirect(&self) -> Option<String>;

    /// # Errors
    ///
    /// Storage write failures.
    fn take_redirect(&self) -> Result<Option<String>, SessionError>;
}

#[async_trait::async_trait]
impl<T: SessionAccessor + ?Sized> SessionAccessor for Arc<T> {
    fn snapshot(&self) -> Session {
        (**self).snapshot()
    }

    async fn hydrate(&self) -> Result<(), SessionError> {
        (**self).hydrate().await
    }

    fn logout(&self) {
        (**self).logout();
    }
}

impl<T: SessionStorage + ?Sized> SessionStorage for Arc<T> {
    fn load_token(&self) -> Option<String> {
        (**self).load_token()
    }

    fn save_token(&self, token: Option<&str>) -> Result<(), SessionError> {
        (**self).save_token(token)
    }

    fn remember_redirect(&self, full_path: &str) -> Result<(), SessionError> {
        (**self).remember_redirect(full_path)
    }

    fn peek_redirect(&self) -> Option<String> {
        (**self).peek_redirect()
    }

    fn take_redirect(&self) -> Result<Option<String>, SessionError> {
        (**self).take_redirect()
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

/// The concrete session: in-memory state backed by a profile source and a
/// storage.
pub struct SessionStore<P, S> {
    profiles: P,
    storage: S,
    session: Mutex<Session>,
}

impl<P: ProfileSource, S: SessionStorage> SessionStore<P, S> {
    /// Start a session from whatever credential `storage` holds.
    pub fn open(profiles: P, storage: S) -> Self {
        let token = storage.load_token();
        tracing::debug!(has_token = token.is_some(), "session opened");
        Self { profiles, storage, session: Mutex::new(Session { token, user: None }) }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn profiles(&self) -> &P {
        &self.profiles
    }

    /// Install a fresh credential, and identity when the caller already has it.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be persisted; memory is updated
    /// regardless.
    pub fn login(&self, token: String, user: Option<UserProfile>) -> Result<(), SessionError> {
        let persisted = self.storage.save_token(Some(&token));
        *self.lock() = Session { token: Some(token), user };
        persisted
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait::async_trait]
impl<P: ProfileSource, S: SessionStorage> SessionAccessor for SessionStore<P, S> {
    fn snapshot(&self) -> Session {
        self.lock().clone()
    }

    async fn hydrate(&self) -> Result<(), SessionError> {
        let token = self.lock().token.clone().ok_or(SessionError::NoCredential)?;
        let profile = self.profiles.current_user(&token).await?;

        let mut session = self.lock();
        // A logout or re-login while the fetch was in flight wins.
        if session.token.as_deref() != Some(token.as_str()) {
            return Err(SessionError::Superseded);
        }
        tracing::debug!(user_id = profile.id, role = ?profile.role, "session hydrated");
        session.user = Some(profile);
        Ok(())
    }

    fn logout(&self) {
        *self.lock() = Session::default();
        if let Err(e) = self.storage.save_token(None) {
            tracing::warn!(error = %e, "failed to clear stored credential");
        }
    }
}

// =============================================================================
// STORAGE BACKENDS
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
struct StoredSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    redirect: Option<String>,
}

/// Process-local storage.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<StoredSession>,
}

impl MemoryStorage {
    #[must_use]
    pub fn with_token(token: &str) -> Self {
        Self { inner: Mutex::new(StoredSession { token: Some(token.to_owned()), redirect: None }) }
    }

    fn lock(&self) -> MutexGuard<'_, StoredSession> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SessionStorage for MemoryStorage {
    fn load_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    fn save_token(&self, token: Option<&str>) -> Result<(), SessionError> {
        self.lock().token = token.map(str::to_owned);
        Ok(())
    }

    fn remember_redirect(&self, full_path: &str) -> Result<(), SessionError> {
        self.lock().redirect = Some(full_path.to_owned());
        Ok(())
    }

    fn peek_redirect(&self) -> Option<String> {
        self.lock().redirect.clone()
    }

    fn take_redirect(&self) -> Result<Option<String>, SessionError> {
        Ok(self.lock().redirect.take())
    }
}

/// A JSON file holding `{"token": ..., "redirect": ...}`.
///
/// Every call re-reads the file so separate CLI invocations share one
/// session. A missing file is an empty session.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    // Serializes read-modify-write within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredSession, SessionError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(StoredSession::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StoredSession::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_or_empty(&self) -> StoredSession {
        self.read().unwrap_or_else(|e| {
            tracing::warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
            StoredSession::default()
        })
    }

    fn update(&self, apply: impl FnOnce(&mut StoredSession)) -> Result<StoredSession, SessionError> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut stored = self.read_or_empty();
        let before = stored.clone();
        apply(&mut stored);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&stored)?)?;
        Ok(before)
    }
}

impl SessionStorage for FileStorage {
    fn load_token(&self) -> Option<String> {
        self.read_or_empty().token
    }

    fn save_token(&self, token: Option<&str>) -> Result<(), SessionError> {
        self.update(|s| s.token = token.map(str::to_owned)).map(|_| ())
    }

    fn remember_redirect(&self, full_path: &str) -> Result<(), SessionError> {
        self.update(|s| s.redirect = Some(full_path.to_owned())).map(|_| ())
    }

    fn peek_redirect(&self) -> Option<String> {
        self.read_or_empty().redirect
    }

    fn take_redirect(&self) -> Result<Option<String>, SessionError> {
        self.update(|s| s.redirect = None).map(|before| before.redirect)
    }
}
