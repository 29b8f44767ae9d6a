//! Session store: the device identity and, once paired, the device token issued by the network.
//!
//! Kept in memory and persisted as a single JSON file. A device counts as paired only when a
//! device token is present; a keypair alone means pairing was started but never confirmed.

use crate::device::DeviceIdentity;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// On-disk shape of the session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
    #[serde(flatten)]
    pub identity: DeviceIdentity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_token: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("reading session store {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("parsing session store {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("writing session store {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("device identity: {0}")]
    Identity(String),
}

pub struct SessionStore {
    path: PathBuf,
    session: RwLock<Option<StoredSession>>,
}

impl SessionStore {
    /// Open the store at `path`. A missing file is an empty store; an unreadable or corrupt one is an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let session = match tokio::fs::read_to_string(&path).await {
            Ok(s) => Some(
                serde_json::from_str::<StoredSession>(&s).map_err(|source| StoreError::Parse {
                    path: path.clone(),
                    source,
                })?,
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => return Err(StoreError::Read { path, source }),
        };
        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn has_identity(&self) -> bool {
        self.device_token().await.is_some()
    }

    pub async fn device_token(&self) -> Option<String> {
        let g = self.session.read().await;
        g.as_ref().and_then(|s| s.device_token.clone())
    }

    pub async fn device_id(&self) -> Option<String> {
        let g = self.session.read().await;
        g.as_ref().map(|s| s.identity.device_id.clone())
    }

    /// Return the stored keypair, generating and persisting one on first use.
    pub async fn identity_or_generate(&self) -> Result<DeviceIdentity, StoreError> {
        let mut g = self.session.write().await;
        if let Some(s) = g.as_ref() {
            return Ok(s.identity.clone());
        }
        let identity =
            DeviceIdentity::generate().map_err(|e| StoreError::Identity(e.to_string()))?;
        let session = StoredSession {
            identity: identity.clone(),
            device_token: None,
        };
        self.save(&session).await?;
        *g = Some(session);
        log::info!("generated device identity {}", identity.device_id);
        Ok(identity)
    }

    /// Record the device token issued after pairing and persist it. Memory is updated only
    /// once the file write succeeds.
    pub async fn set_device_token(&self, token: &str) -> Result<(), StoreError> {
        let mut g = self.session.write().await;
        let mut session = match g.as_ref() {
            Some(s) if s.device_token.as_deref() == Some(token) => return Ok(()),
            Some(s) => s.clone(),
            None => {
                return Err(StoreError::Identity(
                    "device token issued before a device identity existed".to_string(),
                ))
            }
        };
        session.device_token = Some(token.to_string());
        self.save(&session).await?;
        *g = Some(session);
        Ok(())
    }

    /// Forget the stored session and delete the file.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut g = self.session.write().await;
        *g = None;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }

    async fn save(&self, session: &StoredSession) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(session)
            .map_err(|e| write_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&self.path, json).await.map_err(write_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("msgbridge-store-{}", uuid::Uuid::new_v4()))
            .join("session.json")
    }

    #[tokio::test]
    async fn missing_file_is_an_unpaired_store() {
        let store = SessionStore::open(temp_store_path()).await.unwrap();
        assert!(!store.has_identity().await);
        assert_eq!(store.device_id().await, None);
    }

    #[tokio::test]
    async fn keypair_alone_is_not_paired() {
        let path = temp_store_path();
        let store = SessionStore::open(&path).await.unwrap();
        let id = store.identity_or_generate().await.unwrap();
        assert!(!store.has_identity().await);
        assert_eq!(store.identity_or_generate().await.unwrap(), id);

        let reopened = SessionStore::open(&path).await.unwrap();
        assert_eq!(reopened.device_id().await, Some(id.device_id));
        assert!(!reopened.has_identity().await);
    }

    #[tokio::test]
    async fn device_token_survives_reopen() {
        let path = temp_store_path();
        let store = SessionStore::open(&path).await.unwrap();
        store.identity_or_generate().await.unwrap();
        store.set_device_token("tok-1").await.unwrap();

        let reopened = SessionStore::open(&path).await.unwrap();
        assert!(reopened.has_identity().await);
        assert_eq!(reopened.device_token().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn token_without_identity_is_rejected() {
        let store = SessionStore::open(temp_store_path()).await.unwrap();
        assert!(matches!(
            store.set_device_token("tok-1").await,
            Err(StoreError::Identity(_))
        ));
    }

    #[tokio::test]
    async fn failed_token_write_leaves_store_unpaired() {
        let path = temp_store_path();
        let store = SessionStore::open(&path).await.unwrap();
        store.identity_or_generate().await.unwrap();
        // a directory where the file should be makes every write fail
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(matches!(
            store.set_device_token("tok-1").await,
            Err(StoreError::Write { .. })
        ));
        assert!(!store.has_identity().await);
        assert_eq!(store.device_token().await, None);
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let path = temp_store_path();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            SessionStore::open(&path).await,
            Err(StoreError::Parse { .. })
        ));
    }

    #[tokio::test]
    async fn clear_removes_the_file() {
        let path = temp_store_path();
        let store = SessionStore::open(&path).await.unwrap();
        store.identity_or_generate().await.unwrap();
        store.set_device_token("tok-1").await.unwrap();
        store.clear().await.unwrap();
        assert!(!path.exists());
        assert!(!store.has_identity().await);
        store.clear().await.unwrap();
    }
}
