//! Postgres implementation of [`SubscriberStore`].

use super::{StoreError, SubscriberStore};
use crate::import::data_structures::NewSubscriberBatch;
use crate::models::{GroupSet, SubscriberRecord};
use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};

#[derive(Debug, FromRow)]
struct SubscriberRow {
    id: i32,
    pid: i32,
    email: String,
    usergroup: String,
    disabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SubscriberRow> for SubscriberRecord {
    fn from(row: SubscriberRow) -> Self {
        SubscriberRecord {
            id: row.id,
            pid: row.pid,
            email: row.email,
            groups: GroupSet::parse(&row.usergroup),
            disabled: row.disabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn find_group(&self, pid: i32, title: &str) -> Result<Option<i32>, StoreError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"SELECT id FROM subscriber_groups
               WHERE pid = $1 AND title = $2 AND deleted = FALSE
               ORDER BY id ASC
               LIMIT 1"#,
        )
        .bind(pid)
        .bind(title)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn create_group(
        &self,
        pid: i32,
        title: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<i32>, StoreError> {
        let id = sqlx::query_scalar::<_, i32>(
            r#"INSERT INTO subscriber_groups (pid, title, is_receiver, imported, created_at, updated_at)
               VALUES ($1, $2, TRUE, TRUE, $3, $3)
               RETURNING id"#,
        )
        .bind(pid)
        .bind(title)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id)
    }

    async fn preload_subscribers(&self, pid: i32) -> Result<Vec<SubscriberRecord>, StoreError> {
        let rows: Vec<SubscriberRow> = sqlx::query_as(
            r#"SELECT id, pid, email, usergroup, disabled, created_at, updated_at
               FROM subscribers
               WHERE pid = $1 AND deleted = FALSE"#,
        )
        .bind(pid)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubscriberRecord::from).collect())
    }

    async fn bulk_insert_subscribers(
        &self,
        batch: &NewSubscriberBatch,
    ) -> Result<Vec<String>, StoreError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let inserted: Vec<String> = sqlx::query_scalar(
            r#"INSERT INTO subscribers (
                   pid, username, email, password_hash, usergroup,
                   created_at, updated_at, imported
               )
               SELECT * FROM UNNEST(
                   $1::int[],
                   $2::text[],
                   $3::text[],
                   $4::text[],
                   $5::text[],
                   $6::timestamptz[],
                   $7::timestamptz[],
                   $8::bool[]
               )
               ON CONFLICT (pid, email) WHERE deleted = FALSE DO NOTHING
               RETURNING email"#,
        )
        .bind(&batch.pids)
        .bind(&batch.usernames)
        .bind(&batch.emails)
        .bind(&batch.password_hashes)
        .bind(&batch.usergroups)
        .bind(&batch.created_at)
        .bind(&batch.updated_at)
        .bind(&batch.imported)
        .fetch_all(&self.pool)
        .await?;

        if inserted.len() < batch.len() {
            log::debug!(
                "bulk_insert_subscribers: {} of {} rows already existed",
                batch.len() - inserted.len(),
                batch.len()
            );
        }
        log::trace!("bulk inserted {} subscribers", inserted.len());
        Ok(inserted)
    }

    async fn find_subscribers_by_email(
        &self,
        pid: i32,
        emails: &[String],
    ) -> Result<Vec<SubscriberRecord>, StoreError> {
        if emails.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<SubscriberRow> = sqlx::query_as(
            r#"SELECT id, pid, email, usergroup, disabled, created_at, updated_at
               FROM subscribers
               WHERE pid = $1 AND email = ANY($2) AND deleted = FALSE"#,
        )
        .bind(pid)
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SubscriberRecord::from).collect())
    }

    async fn update_subscriber_groups(
        &self,
        subscriber_id: i32,
        groups: &GroupSet,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE subscribers SET usergroup = $1, updated_at = $2 WHERE id = $3")
            .bind(groups.to_column())
            .bind(now)
            .bind(subscriber_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn title_column_limit(&self) -> Result<Option<usize>, StoreError> {
        let limit: Option<Option<i32>> = sqlx::query_scalar(
            r#"SELECT character_maximum_length::int4
               FROM information_schema.columns
               WHERE table_schema = current_schema()
                 AND table_name = 'subscriber_groups'
                 AND column_name = 'title'"#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(limit
            .flatten()
            .and_then(|value| usize::try_from(value).ok())
            .filter(|value| *value > 0))
    }
}
