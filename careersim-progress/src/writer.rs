//! Completion Writer primitives: validation and the in-memory half of a
//! completion. The tracker sequences cache and remote writes around these.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::attempt::AttemptRef;
use crate::completed::CompletedSet;
use crate::gating::{TaskStatus, task_status};

/// Programmer-error class: the UI let something through it should not have.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressError {
    #[error("task index {index} is outside the {total}-task simulation")]
    InvalidIndex { index: u32, total: u32 },
    #[error("task {index} is locked; complete task {} first", .index.saturating_sub(1))]
    TaskLocked { index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionOutcome {
    Recorded,
    /// Duplicate submission; nothing changed.
    AlreadyCompleted,
}

/// Result of the asynchronous remote half of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum RemoteWrite {
    Persisted,
    /// No remote write was issued (duplicate completion).
    Skipped,
    /// The write failed; the local completion stands and a later
    /// reconciliation re-propagates it.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReport {
    pub index: u32,
    pub outcome: CompletionOutcome,
    pub remote: RemoteWrite,
}

impl CompletionReport {
    #[must_use]
    pub const fn remote_failed(&self) -> bool {
        matches!(self.remote, RemoteWrite::Failed(_))
    }
}

/// Validate `index` against the attempt and mark it completed in `completed`.
///
/// # Errors
///
/// Returns [`ProgressError::InvalidIndex`] for indices outside the attempt and
/// [`ProgressError::TaskLocked`] when the task is not yet available.
pub fn apply_completion(
    attempt: &AttemptRef,
    completed: &mut CompletedSet,
    index: u32,
) -> Result<CompletionOutcome, ProgressError> {
    if !attempt.in_range(index) {
        return Err(ProgressError::InvalidIndex {
            index,
            total: attempt.total_task_count,
        });
    }
    match task_status(index, completed) {
        TaskStatus::Completed => Ok(CompletionOutcome::AlreadyCompleted),
        TaskStatus::Locked => Err(ProgressError::TaskLocked { index }),
        TaskStatus::Available => {
            completed.insert(index);
            Ok(CompletionOutcome::Recorded)
        }
    }
}
