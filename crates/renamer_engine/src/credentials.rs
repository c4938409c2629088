use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

/// Secret used to authenticate against the naming service.
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into().trim().to_string())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiKey(****)")
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("malformed credential file {path:?}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Keeps the single API key across process restarts.
pub trait CredentialStore: Send + Sync {
    fn get(&self) -> Result<Option<ApiKey>, CredentialError>;
    fn set(&self, key: &ApiKey) -> Result<(), CredentialError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredential {
    api_key: ApiKey,
}

/// JSON file holding `{"api_key": "..."}`, replaced atomically on `set`.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self) -> Result<Option<ApiKey>, CredentialError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CredentialError::Io(err)),
        };
        let stored: StoredCredential =
            serde_json::from_str(&content).map_err(|err| CredentialError::Malformed {
                path: self.path.clone(),
                message: err.to_string(),
            })?;
        if stored.api_key.is_blank() {
            return Ok(None);
        }
        Ok(Some(stored.api_key))
    }

    fn set(&self, key: &ApiKey) -> Result<(), CredentialError> {
        let file_name = self
            .path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| CredentialError::Malformed {
                path: self.path.clone(),
                message: "path has no file name".to_string(),
            })?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let stored = StoredCredential {
            api_key: key.clone(),
        };
        let content = serde_json::to_vec_pretty(&stored).map_err(|err| CredentialError::Malformed {
            path: self.path.clone(),
            message: err.to_string(),
        })?;
        AtomicFileWriter::new(dir).write(file_name, &content)?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    key: Mutex<Option<ApiKey>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(key: ApiKey) -> Self {
        Self {
            key: Mutex::new(Some(key)),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self) -> Result<Option<ApiKey>, CredentialError> {
        Ok(self
            .key
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn set(&self, key: &ApiKey) -> Result<(), CredentialError> {
        *self.key.lock().unwrap_or_else(PoisonError::into_inner) = Some(key.clone());
        Ok(())
    }
}
