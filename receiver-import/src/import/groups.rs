//! Group title to identifier resolution, creating groups on demand.

use crate::import::store::{StoreError, SubscriberStore};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Per-run cache of `(pid, title) -> group id`.
///
/// Lives exactly as long as one import run, so a title repeated across rows
/// costs a single store lookup (plus one insert when it is new).
pub struct GroupResolver {
    now: DateTime<Utc>,
    cache: HashMap<(i32, String), i32>,
    created: usize,
}

impl GroupResolver {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            cache: HashMap::new(),
            created: 0,
        }
    }

    /// Identifier for `title` in `pid`; `None` when the store could not
    /// create a missing group.
    pub async fn resolve<S>(
        &mut self,
        store: &S,
        pid: i32,
        title: &str,
    ) -> Result<Option<i32>, StoreError>
    where
        S: SubscriberStore + ?Sized,
    {
        let key = (pid, title.to_string());
        if let Some(id) = self.cache.get(&key) {
            return Ok(Some(*id));
        }

        let id = match store.find_group(pid, title).await? {
            Some(id) => Some(id),
            None => {
                let created = store.create_group(pid, title, self.now).await?;
                if let Some(id) = created {
                    self.created += 1;
                    log::debug!("created group '{}' (id {}) in pid {}", title, id, pid);
                }
                created
            }
        };

        if let Some(id) = id {
            self.cache.insert(key, id);
        }
        Ok(id)
    }

    /// Groups created during this run.
    pub fn created(&self) -> usize {
        self.created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::store::MemoryStore;

    #[tokio::test]
    async fn reuses_existing_group() {
        let store = MemoryStore::new();
        let sales = store.seed_group(5, "Sales");
        let mut resolver = GroupResolver::new(Utc::now());

        let id = resolver.resolve(&store, 5, "Sales").await.expect("resolve");
        assert_eq!(id, Some(sales));
        assert_eq!(resolver.created(), 0);
        assert_eq!(store.calls().create_group, 0);
    }

    #[tokio::test]
    async fn creates_missing_group_once_per_run() {
        let store = MemoryStore::new();
        let mut resolver = GroupResolver::new(Utc::now());

        let first = resolver.resolve(&store, 5, "VIP").await.expect("resolve");
        let second = resolver.resolve(&store, 5, "VIP").await.expect("resolve");

        assert!(first.is_some());
        assert_eq!(first, second);
        assert_eq!(resolver.created(), 1);
        assert_eq!(store.calls().find_group, 1);
        assert_eq!(store.calls().create_group, 1);
        assert_eq!(store.groups(5), vec![(first.unwrap(), "VIP".to_string(), true)]);
    }

    #[tokio::test]
    async fn cache_is_scoped_by_container() {
        let store = MemoryStore::new();
        let mut resolver = GroupResolver::new(Utc::now());

        let here = resolver.resolve(&store, 1, "News").await.expect("resolve");
        let there = resolver.resolve(&store, 2, "News").await.expect("resolve");

        assert_ne!(here, there);
        assert_eq!(resolver.created(), 2);
    }

    #[tokio::test]
    async fn refused_creation_is_not_cached() {
        let store = MemoryStore::new();
        store.refuse_group("Broken");
        let mut resolver = GroupResolver::new(Utc::now());

        assert_eq!(resolver.resolve(&store, 1, "Broken").await.expect("resolve"), None);
        assert_eq!(resolver.resolve(&store, 1, "Broken").await.expect("resolve"), None);
        assert_eq!(store.calls().create_group, 2);
    }
}
