use crate::credentials::CredentialError;
use crate::import::data_structures::RaggedColumn;
use crate::import::store::StoreError;
use thiserror::Error;

/// Failures that abort an import run. Bad input never ends up here; it is
/// reported per row instead.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
    #[error("bulk insert column `{column}` has {actual} values but {expected} rows are queued")]
    BatchShape {
        column: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("subscribers missing after bulk insert: {}", .emails.join(", "))]
    MissingAfterInsert { emails: Vec<String> },
}

impl From<RaggedColumn> for ImportError {
    fn from(ragged: RaggedColumn) -> Self {
        ImportError::BatchShape {
            column: ragged.column,
            expected: ragged.expected,
            actual: ragged.actual,
        }
    }
}
