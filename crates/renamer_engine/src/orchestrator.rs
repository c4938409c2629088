use std::path::Path;
use std::sync::{mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use renamer_core::{JobEnd, JobSnapshot, JobState, JobStatus, Mode};
use renamer_logging::{job_error, job_info, job_warn, renamer_info, renamer_warn};
use tokio_util::sync::CancellationToken;

use crate::credentials::{ApiKey, CredentialStore};
use crate::export::{export_batch, ExportOptions, ExportSummary};
use crate::namer::Namer;
use crate::retry::RetryPolicy;
use crate::staging::StagingArea;
use crate::types::{KeyStatus, OrchestratorError};
use crate::worker::{run_job, JobContext};

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub retry: RetryPolicy,
    /// How often `stop` re-checks the job status.
    pub stop_poll_interval: Duration,
    /// How long `stop` waits for the worker before giving up.
    pub stop_timeout: Duration,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            stop_poll_interval: Duration::from_millis(200),
            stop_timeout: Duration::from_secs(5),
        }
    }
}

/// The job record plus the cancellation token of the job it describes,
/// guarded together.
pub(crate) struct Shared {
    pub(crate) job: JobState,
    pub(crate) cancel: CancellationToken,
    /// A foreground call is doing file IO on the staging area outside the lock.
    pub(crate) staging_busy: bool,
}

pub(crate) fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Claims the staging area for one foreground operation so its file IO can
/// run without holding the job lock. Released on drop.
struct StagingLease<'a> {
    shared: &'a Mutex<Shared>,
}

impl<'a> StagingLease<'a> {
    fn acquire(shared: &'a Mutex<Shared>, guard: &mut Shared) -> Result<Self, OrchestratorError> {
        if guard.staging_busy {
            return Err(OrchestratorError::StagingBusy);
        }
        guard.staging_busy = true;
        Ok(Self { shared })
    }
}

impl Drop for StagingLease<'_> {
    fn drop(&mut self) {
        lock(self.shared).staging_busy = false;
    }
}

enum EngineCommand {
    Run(JobContext),
}

/// Runs at most one rename job at a time on a background runtime and exposes
/// start/poll/stop/clear to a foreground caller.
///
/// All calls are synchronous. `stop` and `clear_staged` may block for up to
/// the configured stop timeout, and `stage_file`, `clear_staged` and `export`
/// for as long as their file IO takes. `poll` never waits on any of them.
/// Dropping the orchestrator waits for a running job to stop and revert.
/// Must not be called from inside an async context.
pub struct Orchestrator {
    shared: Arc<Mutex<Shared>>,
    cmd_tx: mpsc::Sender<EngineCommand>,
    runtime: tokio::runtime::Handle,
    namer: Arc<dyn Namer>,
    staging: Arc<dyn StagingArea>,
    credentials: Arc<dyn CredentialStore>,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        namer: Arc<dyn Namer>,
        staging: Arc<dyn StagingArea>,
        credentials: Arc<dyn CredentialStore>,
        settings: OrchestratorSettings,
    ) -> Result<Self, OrchestratorError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("renamer-worker")
            .build()
            .map_err(OrchestratorError::Runtime)?;
        let handle = runtime.handle().clone();
        let (cmd_tx, cmd_rx) = mpsc::channel();

        thread::Builder::new()
            .name("renamer-engine".to_string())
            .spawn(move || engine_loop(runtime, cmd_rx))
            .map_err(OrchestratorError::Runtime)?;

        Ok(Self {
            shared: Arc::new(Mutex::new(Shared {
                job: JobState::new(),
                cancel: CancellationToken::new(),
                staging_busy: false,
            })),
            cmd_tx,
            runtime: handle,
            namer,
            staging,
            credentials,
            settings,
        })
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Verify `key` with the namer and persist it when valid.
    pub fn configure_key(&self, key: ApiKey) -> Result<KeyStatus, OrchestratorError> {
        let namer = self.namer.clone();
        let probe = key.clone();
        let status = self
            .runtime
            .block_on(async move { namer.verify_key(&probe).await })?;
        match status {
            KeyStatus::Valid => {
                self.credentials.set(&key)?;
                renamer_info!("API key verified and stored");
            }
            KeyStatus::Invalid => renamer_warn!("API key rejected by the naming service"),
        }
        Ok(status)
    }

    /// Add or replace a staged file. Refused while a job runs or another
    /// call is using the staging area.
    pub fn stage_file(&self, id: &str, content: Bytes) -> Result<(), OrchestratorError> {
        let _lease = {
            let mut shared = lock(&self.shared);
            if shared.job.is_running() {
                return Err(OrchestratorError::AlreadyRunning);
            }
            StagingLease::acquire(&self.shared, &mut shared)?
        };
        self.staging.put(id, content)?;
        Ok(())
    }

    pub fn staged_files(&self) -> Result<Vec<String>, OrchestratorError> {
        Ok(self.staging.list_ids()?)
    }

    /// Snapshot the staged files and launch a job over them in the
    /// background. Returns without waiting for any file to be processed.
    pub fn start(
        &self,
        mode: Mode,
        instructions: impl Into<String>,
    ) -> Result<JobSnapshot, OrchestratorError> {
        let key = self
            .credentials
            .get()?
            .ok_or(OrchestratorError::NoValidCredential)?;
        let instructions = instructions.into();

        let (context, snapshot) = {
            let mut shared = lock(&self.shared);
            if shared.job.is_running() {
                return Err(OrchestratorError::AlreadyRunning);
            }
            if shared.staging_busy {
                return Err(OrchestratorError::StagingBusy);
            }
            let staged = self.staging.list_ids()?;
            let job_id = shared
                .job
                .begin(staged.clone(), mode, instructions.clone())?;
            let cancel = CancellationToken::new();
            shared.cancel = cancel.clone();

            let context = JobContext {
                job_id,
                staged,
                mode,
                instructions,
                key,
                cancel,
                shared: self.shared.clone(),
                namer: self.namer.clone(),
                staging: self.staging.clone(),
                retry: self.settings.retry.clone(),
            };
            (context, shared.job.view())
        };

        if self.cmd_tx.send(EngineCommand::Run(context)).is_err() {
            lock(&self.shared)
                .job
                .finish(JobEnd::Failed("engine thread unavailable".to_string()));
            return Err(OrchestratorError::EngineUnavailable);
        }
        job_info!(snapshot.job_id, "queued {} file(s)", snapshot.total);
        Ok(snapshot)
    }

    pub fn poll(&self) -> JobSnapshot {
        lock(&self.shared).job.view()
    }

    /// Ask the running job to stop and wait for it to settle.
    ///
    /// Succeeds at once when nothing runs. On [`OrchestratorError::StopTimeout`]
    /// the job keeps running with its cancel flag raised; call again later.
    pub fn stop(&self) -> Result<(), OrchestratorError> {
        let job_id = {
            let mut shared = lock(&self.shared);
            if !shared.job.request_cancel() {
                return Ok(());
            }
            shared.cancel.cancel();
            shared.job.job_id()
        };
        job_info!(job_id, "stop requested");

        let started = Instant::now();
        loop {
            {
                let shared = lock(&self.shared);
                if !shared.job.is_running() || shared.job.job_id() != job_id {
                    return Ok(());
                }
            }
            let waited = started.elapsed();
            if waited >= self.settings.stop_timeout {
                job_warn!(job_id, "still running after {:?}", waited);
                return Err(OrchestratorError::StopTimeout { waited });
            }
            thread::sleep(
                self.settings
                    .stop_poll_interval
                    .min(self.settings.stop_timeout - waited),
            );
        }
    }

    /// Stop any running job, delete every staged file, and reset to `Idle`.
    pub fn clear_staged(&self) -> Result<(), OrchestratorError> {
        self.stop()?;
        let _lease = {
            let mut shared = lock(&self.shared);
            if shared.job.is_running() {
                // A new job was started between the stop and this point.
                return Err(OrchestratorError::AlreadyRunning);
            }
            StagingLease::acquire(&self.shared, &mut shared)?
        };
        self.staging.clear()?;
        let cleared = lock(&self.shared).job.clear();
        cleared?;
        renamer_info!("Cleared staged files");
        Ok(())
    }

    /// Copy the files of the last completed job into `dest`.
    pub fn export(
        &self,
        dest: &Path,
        options: &ExportOptions,
    ) -> Result<ExportSummary, OrchestratorError> {
        // No job can start while the lease is held, so the batch stays put
        // during the copy.
        let (job_id, produced, _lease) = {
            let mut shared = lock(&self.shared);
            if shared.job.status() != JobStatus::Completed {
                return Err(OrchestratorError::NothingToExport);
            }
            let lease = StagingLease::acquire(&self.shared, &mut shared)?;
            (shared.job.job_id(), shared.job.produced().to_vec(), lease)
        };
        let summary = export_batch(self.staging.as_ref(), &produced, dest, options)?;
        job_info!(
            job_id,
            "exported {} file(s) to {:?}",
            summary.file_count,
            summary.output_dir
        );
        Ok(summary)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        // Tearing the runtime down mid-job would skip the revert and leave
        // renamed files behind.
        while let Err(err) = self.stop() {
            renamer_warn!("Waiting for the rename job to settle before shutdown: {err}");
        }
    }
}

fn engine_loop(runtime: tokio::runtime::Runtime, cmd_rx: mpsc::Receiver<EngineCommand>) {
    while let Ok(command) = cmd_rx.recv() {
        match command {
            EngineCommand::Run(context) => {
                let job_id = context.job_id;
                let shared = context.shared.clone();
                let task = runtime.spawn(run_job(context));
                // Supervisor: a worker that dies without settling the record
                // would leave the job `Running` forever.
                runtime.spawn(async move {
                    if let Err(err) = task.await {
                        job_error!(job_id, "worker task failed: {err}");
                        let mut shared = lock(&shared);
                        if shared.job.job_id() == job_id {
                            shared
                                .job
                                .finish(JobEnd::Failed(format!("worker task failed: {err}")));
                        }
                    }
                });
            }
        }
    }
    runtime.shutdown_background();
}
