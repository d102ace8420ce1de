//! Columnar batch of subscribers awaiting a bulk insert.
//!
//! The parallel vectors map one-to-one onto the arrays bound to the
//! `UNNEST` insert statement. Every column must have the same length.

use crate::models::GroupSet;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Hook that may rewrite a batch right before it is written.
///
/// The returned batch must stay rectangular; a ragged batch aborts the run.
pub type PreInsertTransform = Arc<dyn Fn(NewSubscriberBatch) -> NewSubscriberBatch + Send + Sync>;

/// A single subscriber about to be created.
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub pid: i32,
    pub email: String,
    pub password_hash: String,
    pub groups: GroupSet,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewSubscriberBatch {
    pub pids: Vec<i32>,
    pub usernames: Vec<String>,
    pub emails: Vec<String>,
    pub password_hashes: Vec<String>,
    pub usergroups: Vec<String>,
    pub created_at: Vec<DateTime<Utc>>,
    pub updated_at: Vec<DateTime<Utc>>,
    pub imported: Vec<bool>,
}

/// Column whose length disagrees with the email column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaggedColumn {
    pub column: &'static str,
    pub expected: usize,
    pub actual: usize,
}

impl NewSubscriberBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pids: Vec::with_capacity(capacity),
            usernames: Vec::with_capacity(capacity),
            emails: Vec::with_capacity(capacity),
            password_hashes: Vec::with_capacity(capacity),
            usergroups: Vec::with_capacity(capacity),
            created_at: Vec::with_capacity(capacity),
            updated_at: Vec::with_capacity(capacity),
            imported: Vec::with_capacity(capacity),
        }
    }

    /// Append a subscriber; the username is the email address.
    pub fn push(&mut self, subscriber: NewSubscriber) {
        self.pids.push(subscriber.pid);
        self.usernames.push(subscriber.email.clone());
        self.emails.push(subscriber.email);
        self.password_hashes.push(subscriber.password_hash);
        self.usergroups.push(subscriber.groups.to_column());
        self.created_at.push(subscriber.created_at);
        self.updated_at.push(subscriber.created_at);
        self.imported.push(true);
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }

    /// Verify every column carries one value per queued row.
    pub fn check_shape(&self) -> Result<(), RaggedColumn> {
        let expected = self.emails.len();
        let columns = [
            ("pid", self.pids.len()),
            ("username", self.usernames.len()),
            ("password_hash", self.password_hashes.len()),
            ("usergroup", self.usergroups.len()),
            ("created_at", self.created_at.len()),
            ("updated_at", self.updated_at.len()),
            ("imported", self.imported.len()),
        ];

        for (column, actual) in columns {
            if actual != expected {
                return Err(RaggedColumn {
                    column,
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
