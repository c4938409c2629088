//! Renamer engine: rename job orchestration and its collaborators.
mod credentials;
mod export;
mod namer;
mod orchestrator;
mod persist;
mod retry;
mod staging;
mod types;
mod worker;

pub use credentials::{
    ApiKey, CredentialError, CredentialStore, FileCredentialStore, MemoryCredentialStore,
};
pub use export::{export_batch, ExportError, ExportOptions, ExportSummary};
pub use namer::{ChatCompletionsNamer, NameRequest, Namer, NamerSettings};
pub use orchestrator::{Orchestrator, OrchestratorSettings};
pub use persist::{ensure_dir, AtomicFileWriter, PersistError};
pub use retry::{name_with_retry, NamingOutcome, RetryPolicy};
pub use staging::{DirStagingArea, MemoryStagingArea, StagingArea, StorageError};
pub use types::{KeyStatus, NamerError, OrchestratorError};

pub use renamer_core::{JobId, JobSnapshot, JobStatus, Mode};
