//! Client-local mirror of one attempt's completed set.
use serde::{Deserialize, Serialize};

use crate::attempt::{AttemptId, AttemptRef, SimulationId};
use crate::completed::CompletedSet;

/// Schema version written into every snapshot. Entries with any other
/// version are discarded on read.
pub const SNAPSHOT_VERSION: u16 = 1;

/// Local Progress Snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub version: u16,
    pub simulation_id: SimulationId,
    pub attempt_id: AttemptId,
    pub completed: CompletedSet,
    /// Milliseconds since the Unix epoch.
    pub captured_at_ms: u64,
}

impl ProgressSnapshot {
    #[must_use]
    pub fn capture(attempt: &AttemptRef, completed: &CompletedSet, captured_at_ms: u64) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            simulation_id: attempt.simulation_id.clone(),
            attempt_id: attempt.attempt_id.clone(),
            completed: completed.clamped(attempt.total_task_count),
            captured_at_ms,
        }
    }

    /// A snapshot only describes the viewed attempt when both identities and
    /// the schema version line up.
    #[must_use]
    pub fn belongs_to(&self, attempt: &AttemptRef) -> bool {
        self.version == SNAPSHOT_VERSION
            && self.simulation_id == attempt.simulation_id
            && self.attempt_id == attempt.attempt_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_clamps_to_task_count() {
        let attempt = AttemptRef::new("sim", "att", 3);
        let snap = ProgressSnapshot::capture(&attempt, &CompletedSet::from_indices([0, 5]), 42);
        assert_eq!(snap.completed.as_slice(), &[0]);
        assert_eq!(snap.captured_at_ms, 42);
        assert!(snap.belongs_to(&attempt));
    }

    #[test]
    fn identity_mismatch_is_foreign() {
        let attempt = AttemptRef::new("sim", "att", 3);
        let snap = ProgressSnapshot::capture(&attempt, &CompletedSet::new(), 1);
        assert!(!snap.belongs_to(&AttemptRef::new("sim", "att-2", 3)));
        assert!(!snap.belongs_to(&AttemptRef::new("sim-2", "att", 3)));

        let mut old = snap;
        old.version = 0;
        assert!(!old.belongs_to(&attempt));
    }
}
