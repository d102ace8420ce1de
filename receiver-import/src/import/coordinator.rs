//! One import run from validated form values to the final report.

use crate::credentials::CredentialService;
use crate::import::config::ImportConfig;
use crate::import::data_structures::PreInsertTransform;
use crate::import::error::ImportError;
use crate::import::groups::GroupResolver;
use crate::import::reconciler::SubscriberReconciler;
use crate::import::request::{ImportArguments, ImportSettings};
use crate::import::rows::{RowOutcome, RowProcessor};
use crate::import::sheet::Worksheet;
use crate::import::stats::{ImportReport, ImportStats, RowError};
use crate::import::store::SubscriberStore;
use chrono::Utc;

/// Imports receivers into a single container.
///
/// Runs are sequential: every store call is awaited before the next row is
/// looked at, and the caches built during a run are dropped with it.
pub struct ReceiverImporter<'a, S: SubscriberStore + ?Sized> {
    store: &'a S,
    config: ImportConfig,
    credentials: CredentialService,
    transform: Option<PreInsertTransform>,
}

impl<'a, S: SubscriberStore + ?Sized> ReceiverImporter<'a, S> {
    pub fn new(store: &'a S, config: ImportConfig, credentials: CredentialService) -> Self {
        Self {
            store,
            config,
            credentials,
            transform: None,
        }
    }

    /// Hook applied to every bulk-insert batch right before it is written.
    pub fn with_pre_insert_transform(mut self, transform: PreInsertTransform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Validate the submitted form and run the import when it is usable.
    pub async fn import(
        &self,
        arguments: &ImportArguments,
        workbook: Vec<u8>,
    ) -> Result<ImportReport, ImportError> {
        match arguments.to_settings() {
            Ok(settings) => self.import_workbook(&settings, workbook).await,
            Err(errors) => {
                log::info!("import request rejected: {} field errors", errors.len());
                Ok(ImportReport::invalid_request(errors))
            }
        }
    }

    pub async fn import_workbook(
        &self,
        settings: &ImportSettings,
        workbook: Vec<u8>,
    ) -> Result<ImportReport, ImportError> {
        let now = Utc::now();
        log::info!(
            "starting receiver import into pid {} (title column {}, email column {})",
            settings.pid,
            settings.title_column + 1,
            settings.email_column + 1
        );

        let sheet = match Worksheet::from_bytes(workbook) {
            Ok(sheet) => sheet,
            Err(err) => {
                log::warn!("import into pid {} aborted: {}", settings.pid, err);
                let row_errors = vec![RowError {
                    row: 0,
                    email: String::new(),
                    error: format!("Failed to parse spreadsheet: {err}"),
                }];
                return Ok(ImportReport::completed(ImportStats::default(), row_errors));
            }
        };

        let config = self
            .config
            .with_title_limit(self.store.title_column_limit().await?);
        let processor = RowProcessor::new(settings, &config);
        let mut resolver = GroupResolver::new(now);
        let mut reconciler = SubscriberReconciler::preload(
            self.store,
            settings.pid,
            config.batch_size,
            self.credentials.clone(),
            now,
        )
        .await?
        .with_transform(self.transform.clone());

        let mut stats = ImportStats::default();
        let mut row_errors = Vec::new();

        for row in sheet.rows() {
            if settings.has_title_row && row.number == 1 {
                continue;
            }

            match processor.process(&row, &mut resolver, self.store).await? {
                RowOutcome::Accepted { email, groups } => {
                    reconciler.reconcile(self.store, &email, &groups).await?;
                }
                RowOutcome::Rejected { email, reason } => {
                    stats.skipped += 1;
                    row_errors.push(RowError {
                        row: row.number,
                        email,
                        error: reason.to_string(),
                    });
                }
            }
        }

        let totals = reconciler.finish(self.store).await?;
        stats.imported = totals.inserted;
        stats.updated = totals.updated;
        stats.unchanged = totals.unchanged;

        log::info!(
            "receiver import into pid {} finished: {} imported, {} updated, {} unchanged, {} skipped, {} groups created",
            settings.pid,
            stats.imported,
            stats.updated,
            stats.unchanged,
            stats.skipped,
            resolver.created()
        );

        Ok(ImportReport::completed(stats, row_errors))
    }
}
