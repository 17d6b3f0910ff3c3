use crate::config::Config;
use crate::error::NexusError;
use crate::store::models::CredentialRecord;
use parking_lot::RwLock;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File-backed store for the active bearer token plus the mutable project
/// selection used to build document URLs.
///
/// The file is read on [`CredentialStore::open`] and [`CredentialStore::reload`]
/// only; [`CredentialStore::current_token`] serves the cached value.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    project_key: String,
    state: RwLock<StoreState>,
    write_lock: Mutex<()>,
}

struct StoreState {
    persisted: Option<String>,
    override_token: Option<String>,
    project_id: String,
    database: String,
}

impl CredentialStore {
    pub async fn open(cfg: &Config) -> Self {
        let store = Self {
            inner: Arc::new(StoreInner {
                path: cfg.token_path.clone(),
                project_key: cfg.project_key.clone(),
                state: RwLock::new(StoreState {
                    persisted: None,
                    override_token: non_empty(&cfg.token),
                    project_id: cfg.project_id.clone(),
                    database: cfg.database.clone(),
                }),
                write_lock: Mutex::new(()),
            }),
        };
        store.reload().await;
        store
    }

    /// Persisted token first, then the override token, else none.
    pub fn current_token(&self) -> Option<String> {
        let state = self.inner.state.read();
        state
            .persisted
            .clone()
            .or_else(|| state.override_token.clone())
    }

    /// Re-read the credential file into the cache.
    ///
    /// Unreadable or malformed files are logged and treated as absent.
    pub async fn reload(&self) -> Option<String> {
        let persisted = match read_record(&self.inner.path).await {
            Ok(record) => record.and_then(|r| non_empty(&r.id_token)),
            Err(e) => {
                warn!(error = %e, "ignoring stored credential");
                None
            }
        };
        self.inner.state.write().persisted = persisted.clone();
        persisted
    }

    /// Persist `token` and make it the override token.
    ///
    /// Nothing in memory changes unless the file write succeeds.
    pub async fn set_token(&self, token: &str) -> Result<(), NexusError> {
        let _guard = self.inner.write_lock.lock().await;
        write_record(&self.inner.path, &CredentialRecord::new(token)).await?;

        let mut state = self.inner.state.write();
        state.persisted = non_empty(token);
        state.override_token = non_empty(token);
        debug!(
            path = %self.inner.path.display(),
            token_len = token.len(),
            "credential stored"
        );
        Ok(())
    }

    /// Forget the stored credential, removing the backing file.
    pub async fn clear(&self) -> Result<(), NexusError> {
        let _guard = self.inner.write_lock.lock().await;
        match tokio::fs::remove_file(&self.inner.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(NexusError::PersistenceWrite {
                    path: self.inner.path.clone(),
                    source,
                });
            }
        }
        let mut state = self.inner.state.write();
        state.persisted = None;
        state.override_token = None;
        info!(path = %self.inner.path.display(), "credential cleared");
        Ok(())
    }

    pub fn set_project_id(&self, id: impl Into<String>) {
        self.inner.state.write().project_id = id.into();
    }

    pub fn set_database(&self, name: impl Into<String>) {
        self.inner.state.write().database = name.into();
    }

    pub fn project_id(&self) -> String {
        self.inner.state.read().project_id.clone()
    }

    pub fn database(&self) -> String {
        self.inner.state.read().database.clone()
    }

    pub fn project_key(&self) -> &str {
        &self.inner.project_key
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

async fn read_record(path: &Path) -> Result<Option<CredentialRecord>, NexusError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no stored credential");
            return Ok(None);
        }
        Err(e) => {
            return Err(NexusError::PersistenceRead {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };
    if content.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| NexusError::PersistenceRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

async fn write_record(path: &Path, record: &CredentialRecord) -> Result<(), NexusError> {
    let to_write_err = |source| NexusError::PersistenceWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(to_write_err)?;
    }
    let body = serde_json::to_vec(record)?;
    tokio::fs::write(path, body).await.map_err(to_write_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        Config {
            token_path: dir.path().join("firebase_auth_token.json"),
            project_id: "demo".to_string(),
            project_key: "key".to_string(),
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn set_token_round_trips_through_file() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir);

        let store = CredentialStore::open(&cfg).await;
        assert_eq!(store.current_token(), None);

        store.set_token("token-1").await.unwrap();
        assert_eq!(store.current_token().as_deref(), Some("token-1"));

        let on_disk = std::fs::read_to_string(&cfg.token_path).unwrap();
        assert_eq!(on_disk, r#"{"id_token":"token-1"}"#);

        let reopened = CredentialStore::open(&cfg).await;
        assert_eq!(reopened.current_token().as_deref(), Some("token-1"));
    }

    #[tokio::test]
    async fn persisted_record_wins_over_override() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_in(&dir);
        std::fs::write(&cfg.token_path, r#"{"id_token":"from-file"}"#).unwrap();
        cfg.token = "from-env".to_string();

        let store = CredentialStore::open(&cfg).await;
        assert_eq!(store.current_token().as_deref(), Some("from-file"));
    }

    #[tokio::test]
    async fn malformed_file_falls_back_to_override() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_in(&dir);
        std::fs::write(&cfg.token_path, "{not json").unwrap();
        cfg.token = "from-env".to_string();

        let store = CredentialStore::open(&cfg).await;
        assert_eq!(store.current_token().as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn reload_picks_up_external_writes() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir);
        let store = CredentialStore::open(&cfg).await;
        store.set_token("old").await.unwrap();

        std::fs::write(&cfg.token_path, r#"{"id_token":"rotated"}"#).unwrap();
        assert_eq!(store.current_token().as_deref(), Some("old"));
        assert_eq!(store.reload().await.as_deref(), Some("rotated"));
        assert_eq!(store.current_token().as_deref(), Some("rotated"));
    }

    #[tokio::test]
    async fn empty_token_is_absent() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir);
        let store = CredentialStore::open(&cfg).await;

        store.set_token("").await.unwrap();
        assert_eq!(store.current_token(), None);
    }

    #[tokio::test]
    async fn write_failure_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config_in(&dir);
        cfg.token = "from-env".to_string();
        // A directory where the file should be makes the write fail.
        cfg.token_path = dir.path().to_path_buf();

        let store = CredentialStore::open(&cfg).await;
        let err = store.set_token("new").await.unwrap_err();
        assert!(matches!(err, NexusError::PersistenceWrite { .. }));
        assert_eq!(store.current_token().as_deref(), Some("from-env"));
    }

    #[tokio::test]
    async fn clear_removes_file_and_cache() {
        let dir = TempDir::new().unwrap();
        let cfg = config_in(&dir);
        let store = CredentialStore::open(&cfg).await;
        store.set_token("token").await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.current_token(), None);
        assert!(!cfg.token_path.exists());
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn project_selection_is_mutable() {
        let dir = TempDir::new().unwrap();
        let store = CredentialStore::open(&config_in(&dir)).await;
        assert_eq!(store.project_id(), "demo");
        assert_eq!(store.database(), "(default)");

        store.set_project_id("other");
        store.set_database("staging");
        assert_eq!(store.project_id(), "other");
        assert_eq!(store.database(), "staging");
        assert_eq!(store.project_key(), "key");
    }
}
