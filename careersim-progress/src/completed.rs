//! Sorted, deduplicated set of completed task indices.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// Inline capacity covers typical simulations without heap allocation.
type IndexBuf = SmallVec<[u32; 8]>;

/// Canonical completed-task set. Always sorted ascending with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<u32>", into = "Vec<u32>")]
pub struct CompletedSet {
    indices: IndexBuf,
}

impl CompletedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from arbitrary indices, sorting and deduplicating.
    #[must_use]
    pub fn from_indices(indices: impl IntoIterator<Item = u32>) -> Self {
        let mut buf: IndexBuf = indices.into_iter().collect();
        buf.sort_unstable();
        buf.dedup();
        Self { indices: buf }
    }

    /// Build a set keeping only indices inside `[0, total_task_count)`.
    #[must_use]
    pub fn bounded(indices: impl IntoIterator<Item = u32>, total_task_count: u32) -> Self {
        Self::from_indices(
            indices
                .into_iter()
                .filter(|index| *index < total_task_count),
        )
    }

    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    /// Insert an index. Returns `true` when it was not already present.
    pub fn insert(&mut self, index: u32) -> bool {
        match self.indices.binary_search(&index) {
            Ok(_) => false,
            Err(pos) => {
                self.indices.insert(pos, index);
                true
            }
        }
    }

    /// Set union; commutative and idempotent.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut merged = IndexBuf::with_capacity(self.len() + other.len());
        let mut left = self.indices.iter().copied().peekable();
        let mut right = other.indices.iter().copied().peekable();
        loop {
            let next = match (left.peek(), right.peek()) {
                (Some(&a), Some(&b)) if a < b => left.next(),
                (Some(&a), Some(&b)) if b < a => right.next(),
                (Some(_), Some(_)) => {
                    right.next();
                    left.next()
                }
                (Some(_), None) => left.next(),
                (None, Some(_)) => right.next(),
                (None, None) => break,
            };
            if let Some(index) = next {
                merged.push(index);
            }
        }
        Self { indices: merged }
    }

    /// Indices in `self` that are missing from `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        Self {
            indices: self
                .indices
                .iter()
                .copied()
                .filter(|index| !other.contains(*index))
                .collect(),
        }
    }

    /// Drop indices outside `[0, total_task_count)`.
    #[must_use]
    pub fn clamped(&self, total_task_count: u32) -> Self {
        Self {
            indices: self
                .indices
                .iter()
                .copied()
                .filter(|index| *index < total_task_count)
                .collect(),
        }
    }

    /// Whether every task of a `total_task_count`-task simulation is present.
    #[must_use]
    pub fn covers_all(&self, total_task_count: u32) -> bool {
        (0..total_task_count).all(|index| self.contains(index))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.indices.iter().copied()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u32] {
        &self.indices
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<u32> {
        self.indices.to_vec()
    }
}

impl From<Vec<u32>> for CompletedSet {
    fn from(value: Vec<u32>) -> Self {
        Self::from_indices(value)
    }
}

impl From<CompletedSet> for Vec<u32> {
    fn from(value: CompletedSet) -> Self {
        value.indices.into_vec()
    }
}

impl FromIterator<u32> for CompletedSet {
    fn from_iter<T: IntoIterator<Item = u32>>(iter: T) -> Self {
        Self::from_indices(iter)
    }
}
