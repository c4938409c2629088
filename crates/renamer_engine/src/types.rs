use std::fmt;
use std::time::Duration;

use renamer_core::JobError;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::export::ExportError;
use crate::staging::StorageError;

/// Answer of the namer's authentication check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Valid,
    Invalid,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyStatus::Valid => write!(f, "valid"),
            KeyStatus::Invalid => write!(f, "invalid"),
        }
    }
}

/// A single namer call failed. Retried by the job, never fatal to it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamerError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("image mode needs the file content")]
    MissingImage,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("a rename job is already running")]
    AlreadyRunning,
    #[error("job did not stop within {waited:?}; try again")]
    StopTimeout { waited: Duration },
    #[error("no verified API key is configured")]
    NoValidCredential,
    #[error("there is no completed batch to export")]
    NothingToExport,
    #[error("staged files are in use by another operation; try again")]
    StagingBusy,
    #[error("engine thread is unavailable")]
    EngineUnavailable,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("namer error: {0}")]
    Namer(#[from] NamerError),
    #[error("export error: {0}")]
    Export(#[from] ExportError),
    #[error("failed to start engine runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl From<JobError> for OrchestratorError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::AlreadyRunning => OrchestratorError::AlreadyRunning,
        }
    }
}
