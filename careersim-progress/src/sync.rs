//! Sync trigger state machine: `uninitialized -> reconciling -> settled`.
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    #[default]
    Uninitialized,
    Reconciling,
    Settled,
}

impl SyncPhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Reconciling => "reconciling",
            Self::Settled => "settled",
        }
    }
}

/// Event sources that ask for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Mount,
    FocusRegained,
    StorageChanged,
    Completion,
    Periodic,
}

impl SyncTrigger {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mount => "mount",
            Self::FocusRegained => "focus",
            Self::StorageChanged => "storage",
            Self::Completion => "completion",
            Self::Periodic => "periodic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Caller owns the pass and must call [`SyncMachine::finish`] afterwards.
    Start(SyncTrigger),
    /// A pass is in flight; a single trailing re-run has been scheduled.
    Deferred,
}

/// Serialises reconciliation passes and collapses trigger bursts.
#[derive(Debug, Clone, Default)]
pub struct SyncMachine {
    phase: SyncPhase,
    pending: Option<SyncTrigger>,
    runs: u64,
    collapsed: u64,
}

impl SyncMachine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        self.phase
    }

    /// Completed passes since creation.
    #[must_use]
    pub const fn runs(&self) -> u64 {
        self.runs
    }

    /// Triggers absorbed into an already scheduled re-run.
    #[must_use]
    pub const fn collapsed(&self) -> u64 {
        self.collapsed
    }

    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Request a pass for `trigger`.
    pub fn begin(&mut self, trigger: SyncTrigger) -> SyncDecision {
        match self.phase {
            SyncPhase::Reconciling => {
                if self.pending.is_some() {
                    self.collapsed += 1;
                } else {
                    self.pending = Some(trigger);
                }
                SyncDecision::Deferred
            }
            SyncPhase::Uninitialized => {
                if trigger != SyncTrigger::Mount {
                    log::debug!("{} trigger before mount; running mount pass", trigger.label());
                }
                self.phase = SyncPhase::Reconciling;
                SyncDecision::Start(SyncTrigger::Mount)
            }
            SyncPhase::Settled => {
                self.phase = SyncPhase::Reconciling;
                SyncDecision::Start(trigger)
            }
        }
    }

    /// Record the end of a pass. Returns the trigger of the trailing re-run
    /// when one was requested meanwhile; the phase then stays `Reconciling`.
    pub fn finish(&mut self) -> Option<SyncTrigger> {
        debug_assert_eq!(self.phase, SyncPhase::Reconciling);
        self.runs += 1;
        match self.pending.take() {
            Some(next) => Some(next),
            None => {
                self.phase = SyncPhase::Settled;
                None
            }
        }
    }
}
