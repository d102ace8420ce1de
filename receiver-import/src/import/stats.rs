//! Import counters and the report handed back to callers.

use crate::import::request::FieldErrors;
use serde::{Deserialize, Serialize};

/// Counters for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStats {
    /// Subscribers created by bulk inserts
    pub imported: usize,
    /// Existing subscribers whose group set grew
    pub updated: usize,
    /// Rows for existing subscribers that already had every group
    pub unchanged: usize,
    /// Rejected rows
    pub skipped: usize,
}

impl ImportStats {
    pub fn successes(&self) -> usize {
        self.imported + self.updated
    }

    /// Overall state given the number of request and row errors.
    pub fn status(&self, error_count: usize) -> ImportStatus {
        let successes = self.successes();

        if error_count > 0 {
            return if successes > 0 {
                ImportStatus::Warning
            } else {
                ImportStatus::Error
            };
        }

        if self.skipped > 0 {
            return ImportStatus::Warning;
        }

        if successes > 0 {
            return ImportStatus::Ok;
        }

        ImportStatus::Info
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Ok,
    Warning,
    Error,
    Info,
}

/// A problem attached to one spreadsheet row. Row `0` marks a file-level error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub email: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    #[serde(rename = "importAttempted")]
    pub import_attempted: bool,
    pub status: ImportStatus,
    #[serde(flatten)]
    pub stats: ImportStats,
    #[serde(rename = "rowErrors")]
    pub row_errors: Vec<RowError>,
    /// Request-level field errors keyed by form field.
    pub errors: FieldErrors,
}

impl ImportReport {
    /// Report for a request that failed validation; nothing was processed.
    pub fn invalid_request(errors: FieldErrors) -> Self {
        let stats = ImportStats::default();
        Self {
            import_attempted: false,
            status: stats.status(errors.len()),
            stats,
            row_errors: Vec::new(),
            errors,
        }
    }

    /// Report for a run that went through the spreadsheet.
    pub fn completed(stats: ImportStats, row_errors: Vec<RowError>) -> Self {
        Self {
            import_attempted: true,
            status: stats.status(row_errors.len()),
            stats,
            row_errors,
            errors: FieldErrors::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(imported: usize, updated: usize, skipped: usize) -> ImportStats {
        ImportStats {
            imported,
            updated,
            unchanged: 0,
            skipped,
        }
    }

    #[test]
    fn errors_with_successes_are_a_warning() {
        assert_eq!(stats(1, 0, 1).status(1), ImportStatus::Warning);
        assert_eq!(stats(0, 2, 0).status(3), ImportStatus::Warning);
    }

    #[test]
    fn errors_without_successes_are_an_error() {
        assert_eq!(stats(0, 0, 2).status(2), ImportStatus::Error);
    }

    #[test]
    fn skipped_rows_without_errors_are_a_warning() {
        assert_eq!(stats(3, 0, 1).status(0), ImportStatus::Warning);
    }

    #[test]
    fn clean_run_is_ok_and_empty_run_is_info() {
        assert_eq!(stats(3, 1, 0).status(0), ImportStatus::Ok);
        assert_eq!(stats(0, 0, 0).status(0), ImportStatus::Info);
        let only_unchanged = ImportStats {
            unchanged: 4,
            ..ImportStats::default()
        };
        assert_eq!(only_unchanged.status(0), ImportStatus::Info);
    }

    #[test]
    fn invalid_request_report_serializes_field_errors() {
        let mut errors = FieldErrors::new();
        errors.insert("importFile".to_string(), "Please upload a file".to_string());
        let report = ImportReport::invalid_request(errors);

        assert_eq!(report.status, ImportStatus::Error);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["importAttempted"], false);
        assert_eq!(json["status"], "error");
        assert_eq!(json["imported"], 0);
        assert_eq!(json["errors"]["importFile"], "Please upload a file");
    }
}
