//! In-memory [`SubscriberStore`] with the same conflict semantics as the
//! Postgres tables. Call counters make round-trip behaviour observable.

use super::{StoreError, SubscriberStore};
use crate::import::data_structures::NewSubscriberBatch;
use crate::models::{GroupSet, SubscriberRecord};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashSet;

#[derive(Debug, Clone)]
struct StoredGroup {
    id: i32,
    pid: i32,
    title: String,
    imported: bool,
    deleted: bool,
}

#[derive(Debug, Clone)]
struct StoredSubscriber {
    record: SubscriberRecord,
    password_hash: String,
    imported: bool,
    deleted: bool,
}

/// Round-trips issued against the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCalls {
    pub find_group: usize,
    pub create_group: usize,
    pub preload: usize,
    pub bulk_insert: usize,
    pub find_by_email: usize,
    pub update_groups: usize,
}

#[derive(Default)]
struct MemoryState {
    groups: Vec<StoredGroup>,
    subscribers: Vec<StoredSubscriber>,
    next_group_id: i32,
    next_subscriber_id: i32,
    calls: StoreCalls,
    refused_titles: HashSet<String>,
    fail_bulk_inserts: bool,
    discard_inserts: bool,
    title_limit: Option<usize>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `limit` as the declared group title length.
    pub fn with_title_limit(self, limit: usize) -> Self {
        self.state.lock().title_limit = Some(limit);
        self
    }

    /// Make `create_group` come back without an identifier for `title`.
    pub fn refuse_group(&self, title: &str) {
        self.state.lock().refused_titles.insert(title.to_string());
    }

    /// Make every bulk insert fail.
    pub fn fail_bulk_inserts(&self) {
        self.state.lock().fail_bulk_inserts = true;
    }

    /// Report every bulk insert as successful without storing the rows.
    pub fn discard_inserts(&self) {
        self.state.lock().discard_inserts = true;
    }

    pub fn seed_group(&self, pid: i32, title: &str) -> i32 {
        let mut state = self.state.lock();
        state.next_group_id += 1;
        let id = state.next_group_id;
        state.groups.push(StoredGroup {
            id,
            pid,
            title: title.to_string(),
            imported: false,
            deleted: false,
        });
        id
    }

    pub fn seed_subscriber(&self, pid: i32, email: &str, groups: &[i32]) -> i32 {
        self.seed(pid, email, groups, false)
    }

    /// Soft-deleted subscriber; invisible to reads, still occupying its row.
    pub fn seed_deleted_subscriber(&self, pid: i32, email: &str) -> i32 {
        self.seed(pid, email, &[], true)
    }

    fn seed(&self, pid: i32, email: &str, groups: &[i32], deleted: bool) -> i32 {
        let mut state = self.state.lock();
        state.next_subscriber_id += 1;
        let id = state.next_subscriber_id;
        let now = Utc::now();
        state.subscribers.push(StoredSubscriber {
            record: SubscriberRecord {
                id,
                pid,
                email: email.to_string(),
                groups: groups.iter().copied().collect(),
                disabled: false,
                created_at: now,
                updated_at: now,
            },
            password_hash: String::new(),
            imported: false,
            deleted,
        });
        id
    }

    pub fn subscriber(&self, pid: i32, email: &str) -> Option<SubscriberRecord> {
        self.state
            .lock()
            .subscribers
            .iter()
            .find(|s| !s.deleted && s.record.pid == pid && s.record.email == email)
            .map(|s| s.record.clone())
    }

    pub fn password_hash(&self, pid: i32, email: &str) -> Option<String> {
        self.state
            .lock()
            .subscribers
            .iter()
            .find(|s| s.record.pid == pid && s.record.email == email)
            .map(|s| s.password_hash.clone())
    }

    pub fn subscriber_count(&self, pid: i32) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| !s.deleted && s.record.pid == pid)
            .count()
    }

    pub fn imported_subscriber_count(&self) -> usize {
        self.state
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.imported)
            .count()
    }

    /// `(id, title, imported)` for every live group of `pid`.
    pub fn groups(&self, pid: i32) -> Vec<(i32, String, bool)> {
        self.state
            .lock()
            .groups
            .iter()
            .filter(|g| !g.deleted && g.pid == pid)
            .map(|g| (g.id, g.title.clone(), g.imported))
            .collect()
    }

    pub fn group_id(&self, pid: i32, title: &str) -> Option<i32> {
        self.groups(pid)
            .into_iter()
            .find(|(_, group_title, _)| group_title == title)
            .map(|(id, _, _)| id)
    }

    pub fn calls(&self) -> StoreCalls {
        self.state.lock().calls
    }
}

#[rocket::async_trait]
impl SubscriberStore for MemoryStore {
    async fn find_group(&self, pid: i32, title: &str) -> Result<Option<i32>, StoreError> {
        let mut state = self.state.lock();
        state.calls.find_group += 1;
        Ok(state
            .groups
            .iter()
            .filter(|g| !g.deleted && g.pid == pid && g.title == title)
            .map(|g| g.id)
            .min())
    }

    async fn create_group(
        &self,
        pid: i32,
        title: &str,
        _now: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError> {
        let mut state = self.state.lock();
        state.calls.create_group += 1;
        if state.refused_titles.contains(title) {
            return Ok(None);
        }
        state.next_group_id += 1;
        let id = state.next_group_id;
        state.groups.push(StoredGroup {
            id,
            pid,
            title: title.to_string(),
            imported: true,
            deleted: false,
        });
        Ok(Some(id))
    }

    async fn preload_subscribers(&self, pid: i32) -> Result<Vec<SubscriberRecord>, StoreError> {
        let mut state = self.state.lock();
        state.calls.preload += 1;
        Ok(state
            .subscribers
            .iter()
            .filter(|s| !s.deleted && s.record.pid == pid)
            .map(|s| s.record.clone())
            .collect())
    }

    async fn bulk_insert_subscribers(
        &self,
        batch: &NewSubscriberBatch,
    ) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock();
        state.calls.bulk_insert += 1;
        if state.fail_bulk_inserts {
            return Err(StoreError::Rejected("bulk insert disabled".to_string()));
        }

        let mut inserted = Vec::new();
        for index in 0..batch.len() {
            let pid = batch.pids[index];
            let email = &batch.emails[index];
            let exists = state
                .subscribers
                .iter()
                .any(|s| !s.deleted && s.record.pid == pid && &s.record.email == email);
            if exists {
                continue;
            }

            if state.discard_inserts {
                inserted.push(email.clone());
                continue;
            }

            state.next_subscriber_id += 1;
            let id = state.next_subscriber_id;
            state.subscribers.push(StoredSubscriber {
                record: SubscriberRecord {
                    id,
                    pid,
                    email: email.clone(),
                    groups: GroupSet::parse(&batch.usergroups[index]),
                    disabled: false,
                    created_at: batch.created_at[index],
                    updated_at: batch.updated_at[index],
                },
                password_hash: batch.password_hashes[index].clone(),
                imported: batch.imported[index],
                deleted: false,
            });
            inserted.push(email.clone());
        }
        Ok(inserted)
    }

    async fn find_subscribers_by_email(
        &self,
        pid: i32,
        emails: &[String],
    ) -> Result<Vec<SubscriberRecord>, StoreError> {
        let mut state = self.state.lock();
        state.calls.find_by_email += 1;
        Ok(state
            .subscribers
            .iter()
            .filter(|s| !s.deleted && s.record.pid == pid && emails.contains(&s.record.email))
            .map(|s| s.record.clone())
            .collect())
    }

    async fn update_subscriber_groups(
        &self,
        subscriber_id: i32,
        groups: &GroupSet,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.calls.update_groups += 1;
        let subscriber = state
            .subscribers
            .iter_mut()
            .find(|s| s.record.id == subscriber_id)
            .ok_or_else(|| StoreError::Rejected(format!("unknown subscriber {subscriber_id}")))?;
        subscriber.record.groups = groups.clone();
        subscriber.record.updated_at = now;
        Ok(())
    }

    async fn title_column_limit(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.state.lock().title_limit)
    }
}
