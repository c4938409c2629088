use std::time::Duration;

use renamer_core::JobId;
use renamer_logging::{job_debug, job_error, job_warn};

use crate::credentials::ApiKey;
use crate::namer::{NameRequest, Namer};

/// Bounded retry with a linear backoff: the pause after failed attempt `n`
/// is `backoff_step * n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_step: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_step * attempt
    }
}

/// What one retried naming call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingOutcome {
    pub name: String,
    pub attempts: u32,
    /// Every pause taken between attempts, in order.
    pub delays: Vec<Duration>,
    /// `true` when every attempt failed and `name` is the unchanged base name.
    pub fell_back: bool,
}

/// Ask `namer` for a name, retrying per `policy`.
///
/// Never fails: after the last failed attempt the base name comes back
/// unchanged, so the file keeps its name instead of failing the job.
pub async fn name_with_retry(
    namer: &dyn Namer,
    key: &ApiKey,
    request: &NameRequest<'_>,
    policy: &RetryPolicy,
    job_id: JobId,
) -> NamingOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = Vec::new();

    for attempt in 1..=max_attempts {
        match namer.generate_name(key, request).await {
            Ok(name) => {
                job_debug!(
                    job_id,
                    "namer attempt {attempt}/{max_attempts} for {:?} succeeded",
                    request.base_name
                );
                return NamingOutcome {
                    name,
                    attempts: attempt,
                    delays,
                    fell_back: false,
                };
            }
            Err(err) => {
                job_warn!(
                    job_id,
                    "namer attempt {attempt}/{max_attempts} for {:?} failed: {err}",
                    request.base_name
                );
                if attempt < max_attempts {
                    let delay = policy.delay_after(attempt);
                    tokio::time::sleep(delay).await;
                    delays.push(delay);
                }
            }
        }
    }

    job_error!(
        job_id,
        "namer gave up on {:?} after {max_attempts} attempt(s); keeping the original name",
        request.base_name
    );
    NamingOutcome {
        name: request.base_name.to_string(),
        attempts: max_attempts,
        delays,
        fell_back: true,
    }
}
