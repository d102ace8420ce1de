use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ===== Response Envelopes =====

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

// ===== Group Membership =====

/// Set of group identifiers a subscriber belongs to.
///
/// Persisted as a comma-delimited column (`"3,7,12"`); only positive
/// identifiers survive parsing, so a damaged column never yields a
/// bogus membership.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupSet(BTreeSet<i32>);

impl GroupSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the delimited column representation.
    pub fn parse(column: &str) -> Self {
        column
            .split(',')
            .filter_map(|fragment| fragment.trim().parse::<i32>().ok())
            .filter(|id| *id > 0)
            .collect()
    }

    /// Render the delimited column representation.
    pub fn to_column(&self) -> String {
        self.0
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn insert(&mut self, id: i32) -> bool {
        self.0.insert(id)
    }

    pub fn extend_from(&mut self, other: &GroupSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn union(&self, other: &GroupSet) -> GroupSet {
        GroupSet(self.0.union(&other.0).copied().collect())
    }

    pub fn is_superset(&self, other: &GroupSet) -> bool {
        self.0.is_superset(&other.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<i32> for GroupSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        GroupSet(iter.into_iter().collect())
    }
}

// ===== Subscriber Models =====

/// A persisted subscriber as the import sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    pub id: i32,
    pub pid: i32,
    pub email: String,
    pub groups: GroupSet,
    pub disabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
