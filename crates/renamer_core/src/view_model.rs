use crate::{JobId, JobStatus, Mode};

/// Immutable copy of the job record handed to polling callers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub mode: Mode,
    pub current: usize,
    pub total: usize,
    pub produced: Vec<String>,
    pub cancel_requested: bool,
    /// Set when the last job ended `Stopped` because of an error rather than
    /// a cancel request.
    pub failure_reason: Option<String>,
}

impl JobSnapshot {
    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    /// Progress in percent, 0 for an empty batch.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current * 100) / self.total).min(100) as u8
    }
}
