//! Bulk import of receivers (subscribers) from a spreadsheet.
//!
//! Each data row names an email address and a comma-separated list of group
//! titles. Groups are resolved by title within the target container and
//! created when missing. Unknown subscribers are created in batches with a
//! random initial credential; known subscribers gain the row's groups and
//! never lose any.
//!
//! - [`ReceiverImporter`] drives a run and produces an [`ImportReport`].
//! - [`RowProcessor`] validates rows.
//! - [`GroupResolver`] maps titles to group ids.
//! - [`SubscriberReconciler`] decides between insert and update.
//! - [`SubscriberStore`] is the persistence seam.

pub mod config;
pub mod coordinator;
pub mod data_structures;
pub mod error;
pub mod groups;
pub mod reconciler;
pub mod request;
pub mod rows;
pub mod sheet;
pub mod stats;
pub mod store;

pub use config::ImportConfig;
pub use coordinator::ReceiverImporter;
pub use data_structures::{NewSubscriber, NewSubscriberBatch, PreInsertTransform};
pub use error::ImportError;
pub use groups::GroupResolver;
pub use reconciler::{ReconcileOutcome, ReconcileTotals, SubscriberReconciler};
pub use request::{FieldErrors, ImportArguments, ImportSettings, check_arguments};
pub use rows::{RowOutcome, RowProcessor, RowRejection};
pub use sheet::{SheetError, SheetRow, Worksheet};
pub use stats::{ImportReport, ImportStats, ImportStatus, RowError};
pub use store::{MemoryStore, PgSubscriberStore, StoreError, SubscriberStore};
