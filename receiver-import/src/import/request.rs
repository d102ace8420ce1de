//! Validation of the submitted import form.
//!
//! Runs before the spreadsheet is opened; a request with any field error is
//! answered without touching the store.

use std::collections::BTreeMap;

pub const FIELD_IMPORT_FILE: &str = "importFile";
pub const FIELD_TITLE_COLUMN: &str = "titleColumn";
pub const FIELD_EMAIL_COLUMN: &str = "emailColumn";
pub const FIELD_IMPORT_PID: &str = "importPid";

/// Field name to human-readable message.
pub type FieldErrors = BTreeMap<String, String>;

/// Form values exactly as they were submitted.
#[derive(Debug, Clone, Default)]
pub struct ImportArguments {
    /// Size of the uploaded file in bytes, `0` when nothing was uploaded.
    pub file_size: u64,
    pub title_column: Option<String>,
    pub email_column: Option<String>,
    pub import_pid: Option<String>,
    pub has_title_row: bool,
}

/// Validated settings for one run. Column indices are zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSettings {
    pub title_column: usize,
    pub email_column: usize,
    pub pid: i32,
    pub has_title_row: bool,
}

fn positive_column(value: Option<&str>) -> Option<usize> {
    value
        .map(str::trim)
        .and_then(|raw| raw.parse::<u32>().ok())
        .filter(|column| *column > 0)
        .map(|column| column as usize)
}

fn positive_pid(value: Option<&str>) -> Option<i32> {
    value
        .map(str::trim)
        .and_then(|raw| raw.parse::<i32>().ok())
        .filter(|pid| *pid > 0)
}

/// Collect every field error; an empty map means the request is usable.
pub fn check_arguments(arguments: &ImportArguments) -> FieldErrors {
    let mut errors = FieldErrors::new();

    if arguments.file_size == 0 {
        errors.insert(FIELD_IMPORT_FILE.to_string(), "Please upload a file".to_string());
    }

    if positive_column(arguments.title_column.as_deref()).is_none() {
        errors.insert(
            FIELD_TITLE_COLUMN.to_string(),
            "titleColumn is missing or not a positive integer".to_string(),
        );
    }

    if positive_column(arguments.email_column.as_deref()).is_none() {
        errors.insert(
            FIELD_EMAIL_COLUMN.to_string(),
            "emailColumn is missing or not a positive integer".to_string(),
        );
    }

    if positive_pid(arguments.import_pid.as_deref()).is_none() {
        errors.insert(
            FIELD_IMPORT_PID.to_string(),
            "importPid is missing or not a positive integer".to_string(),
        );
    }

    errors
}

impl ImportArguments {
    pub fn to_settings(&self) -> Result<ImportSettings, FieldErrors> {
        let errors = check_arguments(self);
        if !errors.is_empty() {
            return Err(errors);
        }

        match (
            positive_column(self.title_column.as_deref()),
            positive_column(self.email_column.as_deref()),
            positive_pid(self.import_pid.as_deref()),
        ) {
            (Some(title_column), Some(email_column), Some(pid)) => Ok(ImportSettings {
                title_column: title_column - 1,
                email_column: email_column - 1,
                pid,
                has_title_row: self.has_title_row,
            }),
            _ => Err(errors),
        }
    }
}
