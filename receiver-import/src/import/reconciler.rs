//! Insert-vs-update decisions for accepted rows.
//!
//! Existing subscribers of the container are loaded once up front. Rows for
//! known emails merge their groups immediately; rows for unknown emails are
//! buffered and created in bulk once the buffer reaches the batch size or the
//! input ends. A subscriber's group set only ever grows.

use crate::credentials::CredentialService;
use crate::import::data_structures::{NewSubscriber, NewSubscriberBatch, PreInsertTransform};
use crate::import::error::ImportError;
use crate::import::store::{StoreError, SubscriberStore};
use crate::models::{GroupSet, SubscriberRecord};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What happened to a row at the time it was reconciled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Unknown email, waiting in the insert buffer.
    Queued,
    /// Existing subscriber gained at least one group.
    Updated,
    /// Existing subscriber already had every group; nothing written.
    Unchanged,
}

/// Running totals, including the outcome of every flush so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileTotals {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl ReconcileTotals {
    fn record(&mut self, outcome: ReconcileOutcome) {
        match outcome {
            ReconcileOutcome::Updated => self.updated += 1,
            ReconcileOutcome::Unchanged => self.unchanged += 1,
            ReconcileOutcome::Queued => {}
        }
    }
}

async fn merge_groups<S>(
    store: &S,
    record: &mut SubscriberRecord,
    groups: &GroupSet,
    now: DateTime<Utc>,
) -> Result<ReconcileOutcome, StoreError>
where
    S: SubscriberStore + ?Sized,
{
    if record.groups.is_superset(groups) {
        return Ok(ReconcileOutcome::Unchanged);
    }

    let merged = record.groups.union(groups);
    store
        .update_subscriber_groups(record.id, &merged, now)
        .await?;
    record.groups = merged;
    record.updated_at = now;
    Ok(ReconcileOutcome::Updated)
}

/// Reconciler bound to a single container for the duration of one run.
pub struct SubscriberReconciler {
    pid: i32,
    batch_size: usize,
    now: DateTime<Utc>,
    existing: HashMap<String, SubscriberRecord>,
    pending: BTreeMap<String, GroupSet>,
    credentials: CredentialService,
    transform: Option<PreInsertTransform>,
    totals: ReconcileTotals,
    flushes: usize,
}

impl SubscriberReconciler {
    /// Load every existing subscriber of `pid` in one read.
    pub async fn preload<S>(
        store: &S,
        pid: i32,
        batch_size: usize,
        credentials: CredentialService,
        now: DateTime<Utc>,
    ) -> Result<Self, ImportError>
    where
        S: SubscriberStore + ?Sized,
    {
        let existing: HashMap<String, SubscriberRecord> = store
            .preload_subscribers(pid)
            .await?
            .into_iter()
            .map(|record| (record.email.clone(), record))
            .collect();

        log::debug!("preloaded {} subscribers for pid {}", existing.len(), pid);

        Ok(Self {
            pid,
            batch_size: batch_size.max(1),
            now,
            existing,
            pending: BTreeMap::new(),
            credentials,
            transform: None,
            totals: ReconcileTotals::default(),
            flushes: 0,
        })
    }

    pub fn with_transform(mut self, transform: Option<PreInsertTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub async fn reconcile<S>(
        &mut self,
        store: &S,
        email: &str,
        groups: &GroupSet,
    ) -> Result<ReconcileOutcome, ImportError>
    where
        S: SubscriberStore + ?Sized,
    {
        if let Some(record) = self.existing.get_mut(email) {
            let outcome = merge_groups(store, record, groups, self.now).await?;
            self.totals.record(outcome);
            return Ok(outcome);
        }

        self.pending
            .entry(email.to_string())
            .or_default()
            .extend_from(groups);

        if self.pending.len() >= self.batch_size {
            self.flush(store).await?;
        }

        Ok(ReconcileOutcome::Queued)
    }

    /// Flush whatever is still buffered and return the final totals.
    pub async fn finish<S>(&mut self, store: &S) -> Result<ReconcileTotals, ImportError>
    where
        S: SubscriberStore + ?Sized,
    {
        if !self.pending.is_empty() {
            self.flush(store).await?;
        }
        Ok(self.totals)
    }

    async fn flush<S>(&mut self, store: &S) -> Result<(), ImportError>
    where
        S: SubscriberStore + ?Sized,
    {
        // Taken up front so the buffer is empty even when the flush fails.
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return Ok(());
        }
        self.flushes += 1;
        let queued = pending.len();

        let mut candidates: BTreeMap<String, GroupSet> = BTreeMap::new();
        for (email, groups) in pending {
            match self.existing.get_mut(&email) {
                Some(record) => {
                    let outcome = merge_groups(store, record, &groups, self.now).await?;
                    self.totals.record(outcome);
                }
                None => {
                    candidates.insert(email, groups);
                }
            }
        }

        if candidates.is_empty() {
            return Ok(());
        }

        let mut batch = NewSubscriberBatch::with_capacity(candidates.len());
        for (email, groups) in &candidates {
            batch.push(NewSubscriber {
                pid: self.pid,
                email: email.clone(),
                password_hash: self.credentials.issue_initial_hash()?,
                groups: groups.clone(),
                created_at: self.now,
            });
        }

        if let Some(transform) = &self.transform {
            batch = transform(batch);
        }
        batch.check_shape()?;

        let inserted: HashSet<String> = store
            .bulk_insert_subscribers(&batch)
            .await?
            .into_iter()
            .collect();
        self.totals.inserted += inserted.len();

        let mut lookup: Vec<String> = candidates.keys().cloned().collect();
        lookup.extend(
            inserted
                .iter()
                .filter(|email| !candidates.contains_key(*email))
                .cloned(),
        );
        let records = store.find_subscribers_by_email(self.pid, &lookup).await?;

        let mut already_present = 0;
        for mut record in records {
            if !inserted.contains(&record.email) {
                // Created by someone else between preload and flush.
                already_present += 1;
                if let Some(groups) = candidates.get(&record.email) {
                    let outcome = merge_groups(store, &mut record, groups, self.now).await?;
                    self.totals.record(outcome);
                }
            }
            self.existing.insert(record.email.clone(), record);
        }

        let missing: Vec<String> = candidates
            .keys()
            .filter(|email| !self.existing.contains_key(*email))
            .cloned()
            .collect();
        if !missing.is_empty() {
            log::error!(
                "flush {}: {} queued subscribers were not found after the bulk insert",
                self.flushes,
                missing.len()
            );
            return Err(ImportError::MissingAfterInsert { emails: missing });
        }

        log::debug!(
            "flush {}: {} queued, {} inserted, {} already present",
            self.flushes,
            queued,
            inserted.len(),
            already_present
        );
        Ok(())
    }

    pub fn totals(&self) -> ReconcileTotals {
        self.totals
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn flushes(&self) -> usize {
        self.flushes
    }
}
