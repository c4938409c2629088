use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use renamer_core::{
    clean_candidate, join_name, resolve_duplicate, split_name, JobEnd, JobId, Mode,
};
use renamer_logging::{job_error, job_info, job_warn};
use tokio_util::sync::CancellationToken;

use crate::credentials::ApiKey;
use crate::namer::{NameRequest, Namer};
use crate::orchestrator::{lock, Shared};
use crate::retry::{name_with_retry, RetryPolicy};
use crate::staging::{StagingArea, StorageError};

/// Everything one background run needs, captured at start.
pub(crate) struct JobContext {
    pub(crate) job_id: JobId,
    pub(crate) staged: Vec<String>,
    pub(crate) mode: Mode,
    pub(crate) instructions: String,
    pub(crate) key: ApiKey,
    pub(crate) cancel: CancellationToken,
    pub(crate) shared: Arc<Mutex<Shared>>,
    pub(crate) namer: Arc<dyn Namer>,
    pub(crate) staging: Arc<dyn StagingArea>,
    pub(crate) retry: RetryPolicy,
}

/// Rename every staged file in order, then settle the job record exactly once.
pub(crate) async fn run_job(ctx: JobContext) {
    let job_id = ctx.job_id;
    job_info!(
        job_id,
        "started: {} file(s), mode {}",
        ctx.staged.len(),
        ctx.mode
    );

    // (original id, assigned id) for everything renamed on storage so far.
    let mut renamed: Vec<(String, String)> = Vec::with_capacity(ctx.staged.len());
    let mut failure: Option<StorageError> = None;

    for (index, original) in ctx.staged.iter().enumerate() {
        if ctx.cancel.is_cancelled() {
            job_info!(
                job_id,
                "cancel observed after {} of {} file(s)",
                renamed.len(),
                ctx.staged.len()
            );
            break;
        }
        match rename_one(&ctx, index, original).await {
            Ok(assigned) => {
                renamed.push((original.clone(), assigned.clone()));
                lock(&ctx.shared).job.record_rename(assigned);
            }
            Err(err) => {
                job_error!(job_id, "aborting: could not rename {:?}: {err}", original);
                failure = Some(err);
                break;
            }
        }
    }

    finalize(&ctx, &renamed, failure);
}

async fn rename_one(
    ctx: &JobContext,
    index: usize,
    original: &str,
) -> Result<String, StorageError> {
    let (base_name, extension) = split_name(original);
    let image = match ctx.mode {
        Mode::Image => Some(ctx.staging.read(original)?),
        Mode::Text => None,
    };
    let request = NameRequest {
        base_name,
        extension,
        mode: ctx.mode,
        instructions: &ctx.instructions,
        image: image.as_deref(),
    };

    let outcome = name_with_retry(
        ctx.namer.as_ref(),
        &ctx.key,
        &request,
        &ctx.retry,
        ctx.job_id,
    )
    .await;

    let mut candidate = clean_candidate(&outcome.name);
    if candidate.is_empty() {
        job_warn!(
            ctx.job_id,
            "namer reply for {:?} was blank; keeping the base name",
            original
        );
        candidate = base_name.to_string();
    }
    let proposed = join_name(&candidate, extension);
    let assigned = resolve_duplicate(&proposed, &taken_names(ctx, index));

    if assigned != original {
        ctx.staging.rename(original, &assigned)?;
    }
    job_info!(ctx.job_id, "{:?} -> {:?}", original, assigned);
    Ok(assigned)
}

/// Names already produced plus staged ids still waiting their turn, so an
/// assigned name never lands on a file that has not been processed yet.
fn taken_names(ctx: &JobContext, index: usize) -> HashSet<String> {
    let shared = lock(&ctx.shared);
    shared
        .job
        .produced()
        .iter()
        .chain(ctx.staged[index + 1..].iter())
        .cloned()
        .collect()
}

fn finalize(ctx: &JobContext, renamed: &[(String, String)], failure: Option<StorageError>) {
    let job_id = ctx.job_id;
    let end = {
        let mut shared = lock(&ctx.shared);
        match failure {
            Some(err) => JobEnd::Failed(err.to_string()),
            None if shared.job.cancel_requested() => JobEnd::Cancelled,
            None => {
                // Decided and applied under one lock so a late stop request
                // cannot slip in between.
                shared.job.finish(JobEnd::Completed);
                job_info!(job_id, "completed: {} file(s) renamed", renamed.len());
                return;
            }
        }
    };

    revert(ctx, renamed);
    lock(&ctx.shared).job.finish(end.clone());
    match end {
        JobEnd::Failed(reason) => job_warn!(job_id, "stopped after failure: {reason}"),
        _ => job_info!(job_id, "stopped on request"),
    }
}

/// Put already renamed files back under their original ids, newest first.
/// Runs while the job is still `Running`, so nothing else touches storage.
fn revert(ctx: &JobContext, renamed: &[(String, String)]) {
    let mut failed = 0usize;
    for (original, assigned) in renamed.iter().rev() {
        if original == assigned {
            continue;
        }
        if let Err(err) = ctx.staging.rename(assigned, original) {
            failed += 1;
            job_error!(
                ctx.job_id,
                "could not revert {:?} -> {:?}: {err}",
                assigned,
                original
            );
        }
    }
    if renamed.is_empty() {
        return;
    }
    if failed == 0 {
        job_info!(ctx.job_id, "reverted {} rename(s)", renamed.len());
    } else {
        job_warn!(
            ctx.job_id,
            "reverted {} of {} rename(s)",
            renamed.len() - failed,
            renamed.len()
        );
    }
}
