//! Session storage for the credential pair and identity snapshot.
//!
//! The [`crate::ApiClient`] never reaches for global state: it is handed an
//! `Arc<dyn SessionStore>` and reads the current access token from it before
//! every call.  Only login, registration, refresh and logout write to it.
//!
//! Two implementations are provided:
//!
//! * [`MemorySessionStore`] for tests and short-lived processes.
//! * [`FileSessionStore`] persisting to `<config dir>/expensa/session.json`,
//!   so a session survives across CLI invocations.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError, RwLock};

use expensa_models::{AuthenticationResponse, TokenRefreshResponse, User};
use serde::{Deserialize, Serialize};

use crate::error::SdkError;

const APP_DIR: &str = "expensa";
const SESSION_FILE: &str = "session.json";

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// The active credential pair plus the cached identity snapshot.
///
/// Persisted as three named values: `accessToken`, `refreshToken` and `user`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Short-lived bearer token attached to every call.
    pub access_token: String,
    /// Token used to mint a new pair; absent means no silent recovery.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Cached profile of the signed-in user.
    #[serde(default)]
    pub user: Option<User>,
}

impl Session {
    /// Apply a refresh response, keeping the current snapshot when the
    /// server did not send a new one.
    pub fn rotated(self, refreshed: TokenRefreshResponse) -> Self {
        Self {
            access_token: refreshed.access_token,
            refresh_token: Some(refreshed.refresh_token),
            user: refreshed.user.or(self.user),
        }
    }
}

impl From<AuthenticationResponse> for Session {
    fn from(resp: AuthenticationResponse) -> Self {
        Self {
            access_token: resp.access_token,
            refresh_token: Some(resp.refresh_token),
            user: Some(resp.user),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Process-wide holder of at most one [`Session`].
///
/// `set` replaces the access token, refresh token and identity snapshot in
/// one step; `clear` removes all three.  Readers never observe a mix of an
/// old and a new pair.
pub trait SessionStore: Send + Sync {
    /// The current session, if any.
    fn get(&self) -> Option<Session>;

    /// Replace the current session.
    fn set(&self, session: Session);

    /// Forget the current session.
    fn clear(&self);

    /// Current access token.
    fn access_token(&self) -> Option<String> {
        self.get().map(|s| s.access_token)
    }

    /// Current refresh token.
    fn refresh_token(&self) -> Option<String> {
        self.get().and_then(|s| s.refresh_token)
    }

    /// Current identity snapshot.
    fn user(&self) -> Option<User> {
        self.get().and_then(|s| s.user)
    }
}

// ---------------------------------------------------------------------------
// MemorySessionStore
// ---------------------------------------------------------------------------

/// In-memory [`SessionStore`].
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<Option<Session>>,
}

impl MemorySessionStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `session`.
    pub fn with_session(session: Session) -> Self {
        Self {
            inner: RwLock::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn get(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, session: Session) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    }

    fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ---------------------------------------------------------------------------
// FileSessionStore
// ---------------------------------------------------------------------------

/// [`SessionStore`] persisted as a JSON file.
///
/// Writes go through a temporary file renamed over the target, so another
/// process reading the file sees either the old or the new session.  Like
/// browser storage, the store itself never fails: unreadable files read as
/// "signed out" and write failures are logged.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Store backed by an explicit file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Store at the well-known location `<config dir>/expensa/session.json`.
    ///
    /// # Errors
    ///
    /// [`SdkError::Config`] when the platform has no config directory.
    pub fn in_config_dir() -> Result<Self, SdkError> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SdkError::Config("could not determine config directory".into()))?;
        Ok(Self::new(dir.join(APP_DIR).join(SESSION_FILE)))
    }

    /// Location of the session file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Option<Session> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to read session file");
                return None;
            }
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "ignoring corrupt session file");
                None
            }
        }
    }

    fn write(&self, session: &Session) -> Result<(), SdkError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(session)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn get(&self) -> Option<Session> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read()
    }

    fn set(&self, session: Session) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = self.write(&session) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist session");
        }
    }

    fn clear(&self) {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove session file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user(name: &str) -> User {
        serde_json::from_value(json!({
            "id": format!("id-{name}"),
            "username": name,
            "email": format!("{name}@example.com"),
            "firstName": name,
            "lastName": "Test",
            "createdAt": "2024-01-01T00:00:00Z",
        }))
        .unwrap()
    }

    fn session(access: &str, refresh: &str) -> Session {
        Session {
            access_token: access.into(),
            refresh_token: Some(refresh.into()),
            user: Some(user("alice")),
        }
    }

    #[test]
    fn memory_store_set_get_clear() {
        let store = MemorySessionStore::new();
        assert!(store.get().is_none());
        assert!(store.access_token().is_none());

        store.set(session("A1", "R1"));
        assert_eq!(store.access_token().as_deref(), Some("A1"));
        assert_eq!(store.refresh_token().as_deref(), Some("R1"));
        assert_eq!(store.user().unwrap().username, "alice");

        store.set(session("A2", "R2"));
        assert_eq!(store.access_token().as_deref(), Some("A2"));
        assert_eq!(store.refresh_token().as_deref(), Some("R2"));

        store.clear();
        assert!(store.get().is_none());
        assert!(store.user().is_none());
    }

    #[test]
    fn rotation_keeps_snapshot_when_absent() {
        let rotated = session("A1", "R1").rotated(TokenRefreshResponse {
            access_token: "A2".into(),
            refresh_token: "R2".into(),
            user: None,
        });
        assert_eq!(rotated.access_token, "A2");
        assert_eq!(rotated.refresh_token.as_deref(), Some("R2"));
        assert_eq!(rotated.user.unwrap().username, "alice");
    }

    #[test]
    fn rotation_replaces_snapshot_when_present() {
        let rotated = session("A1", "R1").rotated(TokenRefreshResponse {
            access_token: "A2".into(),
            refresh_token: "R2".into(),
            user: Some(user("bob")),
        });
        assert_eq!(rotated.user.unwrap().username, "bob");
    }

    #[test]
    fn session_uses_named_values_on_disk() {
        let value = serde_json::to_value(session("A1", "R1")).unwrap();
        assert_eq!(value["accessToken"], "A1");
        assert_eq!(value["refreshToken"], "R1");
        assert_eq!(value["user"]["username"], "alice");
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let store = FileSessionStore::new(&path);
        assert!(store.get().is_none());
        store.set(session("A1", "R1"));
        assert!(path.exists());

        let reopened = FileSessionStore::new(&path);
        assert_eq!(reopened.get(), Some(session("A1", "R1")));

        reopened.clear();
        assert!(!path.exists());
        assert!(store.get().is_none());
        // Clearing twice is harmless.
        store.clear();
    }

    #[test]
    fn file_store_treats_corrupt_file_as_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").unwrap();

        let store = FileSessionStore::new(&path);
        assert!(store.get().is_none());

        store.set(session("A3", "R3"));
        assert_eq!(store.access_token().as_deref(), Some("A3"));
    }

    #[test]
    fn file_store_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileSessionStore::new(&path);
        store.set(session("A1", "R1"));
        store.set(session("A2", "R2"));

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, ["session.json"]);
    }
}
