use std::fmt;

use crate::view_model::JobSnapshot;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Stopped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "idle"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Selects which namer variant names the files of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Name from the current base name only.
    #[default]
    Text,
    /// Name from the file's image content.
    Image,
}

impl Mode {
    /// Parse `text` or `image`, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("text") {
            Some(Mode::Text)
        } else if name.eq_ignore_ascii_case("image") {
            Some(Mode::Image)
        } else {
            None
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Text => write!(f, "text"),
            Mode::Image => write!(f, "image"),
        }
    }
}

/// How the worker left its loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEnd {
    Completed,
    Cancelled,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    AlreadyRunning,
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::AlreadyRunning => write!(f, "a rename job is already running"),
        }
    }
}

impl std::error::Error for JobError {}

/// The single record describing the current or last rename job.
///
/// Pure data: callers provide the mutual exclusion. Every method leaves the
/// record internally consistent, so a reader holding the same lock never sees
/// `current` ahead of `produced` or a status flip before `produced` settles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobState {
    job_id: JobId,
    status: JobStatus,
    mode: Mode,
    staged: Vec<String>,
    produced: Vec<String>,
    current: usize,
    total: usize,
    cancel_requested: bool,
    custom_instructions: String,
    failure_reason: Option<String>,
}

impl JobState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-set into `Running` with a fresh snapshot of staged ids.
    pub fn begin(
        &mut self,
        staged: Vec<String>,
        mode: Mode,
        custom_instructions: impl Into<String>,
    ) -> Result<JobId, JobError> {
        if self.status == JobStatus::Running {
            return Err(JobError::AlreadyRunning);
        }
        self.job_id += 1;
        self.total = staged.len();
        self.staged = staged;
        self.produced = Vec::with_capacity(self.total);
        self.current = 0;
        self.mode = mode;
        self.custom_instructions = custom_instructions.into();
        self.cancel_requested = false;
        self.failure_reason = None;
        self.status = JobStatus::Running;
        Ok(self.job_id)
    }

    /// Append one assigned name and advance `current` in the same step.
    ///
    /// Ignored unless a job is running and still has staged files left.
    pub fn record_rename(&mut self, name: String) -> bool {
        if self.status != JobStatus::Running || self.current >= self.total {
            return false;
        }
        self.produced.push(name);
        self.current += 1;
        true
    }

    /// Raise the cancel flag. Returns `false` when no job is running.
    pub fn request_cancel(&mut self) -> bool {
        if self.status != JobStatus::Running {
            return false;
        }
        self.cancel_requested = true;
        true
    }

    /// Leave `Running`. Anything other than [`JobEnd::Completed`] discards
    /// the partial output.
    pub fn finish(&mut self, end: JobEnd) -> JobStatus {
        if self.status != JobStatus::Running {
            return self.status;
        }
        match end {
            JobEnd::Completed => {
                self.status = JobStatus::Completed;
            }
            JobEnd::Cancelled => {
                self.discard_output();
                self.status = JobStatus::Stopped;
            }
            JobEnd::Failed(reason) => {
                self.discard_output();
                self.failure_reason = Some(reason);
                self.status = JobStatus::Stopped;
            }
        }
        self.cancel_requested = false;
        self.status
    }

    /// Back to `Idle` with nothing staged. Refused while a job runs.
    pub fn clear(&mut self) -> Result<(), JobError> {
        if self.status == JobStatus::Running {
            return Err(JobError::AlreadyRunning);
        }
        self.staged.clear();
        self.discard_output();
        self.total = 0;
        self.cancel_requested = false;
        self.failure_reason = None;
        self.status = JobStatus::Idle;
        Ok(())
    }

    fn discard_output(&mut self) {
        self.produced.clear();
        self.current = 0;
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    pub fn produced(&self) -> &[String] {
        &self.produced
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    pub fn custom_instructions(&self) -> &str {
        &self.custom_instructions
    }

    pub fn view(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id,
            status: self.status,
            mode: self.mode,
            current: self.current,
            total: self.total,
            produced: self.produced.clone(),
            cancel_requested: self.cancel_requested,
            failure_reason: self.failure_reason.clone(),
        }
    }
}
