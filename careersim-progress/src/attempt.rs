//! Attempt identity and the records exchanged with the attempt store.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::completed::CompletedSet;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Construct an identifier, trimming surrounding whitespace.
            #[must_use]
            pub fn new(value: &str) -> Self {
                Self(value.trim().to_string())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Identifier of a simulation (the ordered task list a user works through).
    SimulationId
);
string_id!(
    /// Opaque identifier of one run of one simulation, stable for the run's lifetime.
    AttemptId
);
string_id!(
    /// Authenticated user identifier supplied by the auth collaborator.
    UserId
);

/// The attempt currently being viewed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRef {
    pub simulation_id: SimulationId,
    pub attempt_id: AttemptId,
    pub total_task_count: u32,
}

impl AttemptRef {
    #[must_use]
    pub fn new(simulation_id: &str, attempt_id: &str, total_task_count: u32) -> Self {
        Self {
            simulation_id: SimulationId::new(simulation_id),
            attempt_id: AttemptId::new(attempt_id),
            total_task_count,
        }
    }

    /// Whether `index` names a task of this attempt.
    #[must_use]
    pub const fn in_range(&self, index: u32) -> bool {
        index < self.total_task_count
    }
}

/// Who is interacting with the attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "user_id")]
pub enum Actor {
    #[default]
    Guest,
    User(UserId),
}

impl Actor {
    /// Map the optional identity signal onto an actor; absence means guest.
    #[must_use]
    pub fn from_user_id(user_id: Option<UserId>) -> Self {
        user_id.map_or(Self::Guest, Self::User)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<&UserId> {
        match self {
            Self::Guest => None,
            Self::User(id) => Some(id),
        }
    }
}

/// One run of one simulation by one actor, as the attempt store keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub attempt_id: AttemptId,
    pub simulation_id: SimulationId,
    pub total_task_count: u32,
    /// Sorted, unique, always within `[0, total_task_count)`.
    pub completed_task_indices: Vec<u32>,
    #[serde(default)]
    pub owner_user_id: Option<UserId>,
}

impl Attempt {
    /// Build an attempt record, normalising the completed indices.
    #[must_use]
    pub fn new(
        attempt: &AttemptRef,
        completed: impl IntoIterator<Item = u32>,
        owner_user_id: Option<UserId>,
    ) -> Self {
        let set = CompletedSet::bounded(completed, attempt.total_task_count);
        Self {
            attempt_id: attempt.attempt_id.clone(),
            simulation_id: attempt.simulation_id.clone(),
            total_task_count: attempt.total_task_count,
            completed_task_indices: set.to_vec(),
            owner_user_id,
        }
    }

    #[must_use]
    pub fn attempt_ref(&self) -> AttemptRef {
        AttemptRef {
            simulation_id: self.simulation_id.clone(),
            attempt_id: self.attempt_id.clone(),
            total_task_count: self.total_task_count,
        }
    }

    #[must_use]
    pub fn completed(&self) -> CompletedSet {
        CompletedSet::bounded(
            self.completed_task_indices.iter().copied(),
            self.total_task_count,
        )
    }
}

/// Progress payload returned by the attempt store's read call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProgress {
    #[serde(default)]
    pub completed_task_indices: Vec<u32>,
    #[serde(default)]
    pub total_task_count: u32,
}

impl RemoteProgress {
    #[must_use]
    pub fn new(completed: impl IntoIterator<Item = u32>, total_task_count: u32) -> Self {
        Self {
            completed_task_indices: completed.into_iter().collect(),
            total_task_count,
        }
    }
}

impl From<&Attempt> for RemoteProgress {
    fn from(attempt: &Attempt) -> Self {
        Self {
            completed_task_indices: attempt.completed_task_indices.clone(),
            total_task_count: attempt.total_task_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_trim_whitespace() {
        let id = AttemptId::new("  att-1 \n");
        assert_eq!(id.as_str(), "att-1");
        assert_eq!(id.to_string(), "att-1");
    }

    #[test]
    fn missing_identity_is_guest() {
        assert_eq!(Actor::from_user_id(None), Actor::Guest);
        let user = Actor::from_user_id(Some(UserId::new("u-7")));
        assert!(user.is_authenticated());
        assert_eq!(user.user_id().map(UserId::as_str), Some("u-7"));
    }

    #[test]
    fn attempt_normalises_completed_indices() {
        let attempt_ref = AttemptRef::new("sim-ux", "att-9", 4);
        let attempt = Attempt::new(&attempt_ref, [3, 1, 1, 9, 0], None);
        assert_eq!(attempt.completed_task_indices, vec![0, 1, 3]);
        assert_eq!(attempt.attempt_ref(), attempt_ref);
    }

    #[test]
    fn remote_progress_uses_camel_case_wire_names() {
        let parsed: RemoteProgress =
            serde_json::from_str(r#"{"completedTaskIndices":[0,2],"totalTaskCount":5}"#).unwrap();
        assert_eq!(parsed, RemoteProgress::new([0, 2], 5));
        let empty: RemoteProgress = serde_json::from_str("{}").unwrap();
        assert!(empty.completed_task_indices.is_empty());
    }
}
