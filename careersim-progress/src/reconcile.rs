//! Reconciliation Engine: merges the local snapshot with remote progress.
use serde::{Deserialize, Serialize};

use crate::attempt::{Actor, AttemptRef};
use crate::completed::CompletedSet;
use crate::snapshot::ProgressSnapshot;

/// How local and remote completions combine for an identity context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Guests: a matching local snapshot wins outright; remote is the fallback.
    LocalPreferred,
    /// Authenticated users: union of both sides.
    Union,
}

impl MergePolicy {
    #[must_use]
    pub const fn for_actor(actor: &Actor) -> Self {
        if actor.is_authenticated() {
            Self::Union
        } else {
            Self::LocalPreferred
        }
    }
}

/// Which inputs ended up in the canonical set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileSource {
    Local,
    Remote,
    Merged,
    Empty,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub completed: CompletedSet,
    pub policy: MergePolicy,
    pub source: ReconcileSource,
    /// A snapshot was present but described another attempt.
    pub discarded_stale: bool,
    /// Canonical indices the remote set lacks. Only populated for
    /// [`MergePolicy::Union`] when remote data was read.
    pub pending_remote: CompletedSet,
}

/// Whether the tracker has to consult the attempt store for this pass.
#[must_use]
pub fn needs_remote(actor: &Actor, attempt: &AttemptRef, local: Option<&ProgressSnapshot>) -> bool {
    match MergePolicy::for_actor(actor) {
        MergePolicy::Union => true,
        MergePolicy::LocalPreferred => !local.is_some_and(|snap| snap.belongs_to(attempt)),
    }
}

/// Merge `local` and `remote` into the canonical completed set.
///
/// `remote` is `None` when no remote data is available (not fetched or the
/// fetch failed). The result is sorted, deduplicated and clamped to the
/// attempt's task range. Pure: the cache write-back is the caller's job.
#[must_use]
pub fn reconcile(
    attempt: &AttemptRef,
    local: Option<&ProgressSnapshot>,
    remote: Option<&CompletedSet>,
    actor: &Actor,
) -> Reconciliation {
    let policy = MergePolicy::for_actor(actor);
    let total = attempt.total_task_count;
    let discarded_stale = local.is_some_and(|snap| !snap.belongs_to(attempt));
    let local = local
        .filter(|snap| snap.belongs_to(attempt))
        .map(|snap| snap.completed.clamped(total));
    let remote_set = remote.map(|set| set.clamped(total));

    let (completed, source) = match (policy, local, remote_set.as_ref()) {
        (MergePolicy::LocalPreferred, Some(local), _) => (local, ReconcileSource::Local),
        (_, None, Some(remote)) => (remote.clone(), ReconcileSource::Remote),
        (MergePolicy::Union, Some(local), Some(remote)) => {
            (local.union(remote), ReconcileSource::Merged)
        }
        (MergePolicy::Union, Some(local), None) => (local, ReconcileSource::Local),
        (_, None, None) => (CompletedSet::new(), ReconcileSource::Empty),
    };

    let pending_remote = match (policy, remote_set.as_ref()) {
        (MergePolicy::Union, Some(remote)) => completed.difference(remote),
        _ => CompletedSet::new(),
    };

    Reconciliation {
        completed,
        policy,
        source,
        discarded_stale,
        pending_remote,
    }
}
