//! Persistence seam for the import.
//!
//! The importer only needs a handful of reads and writes against the group
//! and subscriber tables, all scoped by container (`pid`).
//! [`PgSubscriberStore`] talks to Postgres; [`MemoryStore`] keeps the same
//! semantics in memory for tests and dry runs.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgSubscriberStore;

use crate::import::data_structures::NewSubscriberBatch;
use crate::models::{GroupSet, SubscriberRecord};
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("store rejected write: {0}")]
    Rejected(String),
}

#[rocket::async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Identifier of the non-deleted group titled `title` in `pid`.
    async fn find_group(&self, pid: i32, title: &str) -> Result<Option<i32>, StoreError>;

    /// Create an import-tagged group; `None` when no identifier came back.
    async fn create_group(
        &self,
        pid: i32,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError>;

    /// Every non-deleted subscriber of `pid`.
    async fn preload_subscribers(&self, pid: i32) -> Result<Vec<SubscriberRecord>, StoreError>;

    /// Insert the whole batch in one round-trip, returning the emails that
    /// were actually created. Rows colliding with an existing `(pid, email)`
    /// are left untouched.
    async fn bulk_insert_subscribers(
        &self,
        batch: &NewSubscriberBatch,
    ) -> Result<Vec<String>, StoreError>;

    async fn find_subscribers_by_email(
        &self,
        pid: i32,
        emails: &[String],
    ) -> Result<Vec<SubscriberRecord>, StoreError>;

    async fn update_subscriber_groups(
        &self,
        subscriber_id: i32,
        groups: &GroupSet,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Declared maximum length of a group title, if the backend knows it.
    async fn title_column_limit(&self) -> Result<Option<usize>, StoreError> {
        Ok(None)
    }
}
