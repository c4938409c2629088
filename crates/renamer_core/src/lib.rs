//! Renamer core: pure job state machine, poll snapshot and filename helpers.
mod filename;
mod state;
mod view_model;

pub use filename::{clean_candidate, join_name, resolve_duplicate, split_name};
pub use state::{JobEnd, JobError, JobId, JobState, JobStatus, Mode};
pub use view_model::JobSnapshot;
