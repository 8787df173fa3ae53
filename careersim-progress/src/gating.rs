//! Gating Evaluator: strict linear unlocking over a completed set.
use serde::{Deserialize, Serialize};

use crate::completed::CompletedSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Available,
    Locked,
}

impl TaskStatus {
    #[must_use]
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Available => "available",
            Self::Locked => "locked",
        }
    }
}

/// Status of task `index`.
///
/// Membership in `completed` always wins, even for indices linear unlocking
/// would not have reached. Otherwise task 0 is available and task `k` is
/// available only when `k - 1` is completed.
#[must_use]
pub fn task_status(index: u32, completed: &CompletedSet) -> TaskStatus {
    if completed.contains(index) {
        TaskStatus::Completed
    } else if index == 0 || completed.contains(index - 1) {
        TaskStatus::Available
    } else {
        TaskStatus::Locked
    }
}

/// Statuses for every task of a `total_task_count`-task simulation.
#[must_use]
pub fn task_statuses(total_task_count: u32, completed: &CompletedSet) -> Vec<TaskStatus> {
    (0..total_task_count)
        .map(|index| task_status(index, completed))
        .collect()
}

#[must_use]
pub fn is_all_completed(total_task_count: u32, completed: &CompletedSet) -> bool {
    completed.covers_all(total_task_count)
}

/// Lowest index currently available, if any.
#[must_use]
pub fn next_available(total_task_count: u32, completed: &CompletedSet) -> Option<u32> {
    (0..total_task_count).find(|index| task_status(*index, completed).is_available())
}

/// Whole-number completion percentage, for badge and level displays.
#[must_use]
pub fn progress_percent(total_task_count: u32, completed: &CompletedSet) -> u8 {
    if total_task_count == 0 {
        return 0;
    }
    let done = completed.clamped(total_task_count).len();
    let done = u64::try_from(done).unwrap_or(u64::MAX);
    let pct = done.saturating_mul(100) / u64::from(total_task_count);
    u8::try_from(pct.min(100)).unwrap_or(100)
}
