//! Per-row validation and classification.
//!
//! A row is checked in a fixed order: email syntax, presence of at least one
//! group title, title lengths, then group resolution. The first failing check
//! rejects the whole row; nothing is written for a rejected row except groups
//! resolved before a later title failed to be created.

use crate::import::config::ImportConfig;
use crate::import::groups::GroupResolver;
use crate::import::request::ImportSettings;
use crate::import::sheet::SheetRow;
use crate::import::store::{StoreError, SubscriberStore};
use crate::models::GroupSet;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Longest address accepted (RFC 5321 forward-path limit).
const MAX_EMAIL_LENGTH: usize = 254;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

/// WHATWG HTML "valid e-mail address" production.
fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("Invalid email regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    !email.is_empty() && email.len() <= MAX_EMAIL_LENGTH && email_regex().is_match(email)
}

/// Comma-separated titles, trimmed, empty fragments dropped.
pub fn split_group_titles(cell: &str) -> Vec<String> {
    cell.split(',')
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    InvalidEmail,
    EmptyGroupTitle,
    GroupTitleTooLong { title: String, max: usize },
    GroupCreationFailed { title: String },
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowRejection::InvalidEmail => write!(f, "Invalid email format"),
            RowRejection::EmptyGroupTitle => write!(f, "Group title is empty"),
            RowRejection::GroupTitleTooLong { title, max } => {
                write!(f, "Group title \"{title}\" exceeds max length of {max}")
            }
            RowRejection::GroupCreationFailed { title } => {
                write!(f, "Group \"{title}\" could not be created")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Accepted { email: String, groups: GroupSet },
    Rejected { email: String, reason: RowRejection },
}

/// A row that passed the checks which need no store access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub email: String,
    pub titles: Vec<String>,
}

pub struct RowProcessor {
    title_column: usize,
    email_column: usize,
    pid: i32,
    max_title_length: usize,
}

impl RowProcessor {
    pub fn new(settings: &ImportSettings, config: &ImportConfig) -> Self {
        Self {
            title_column: settings.title_column,
            email_column: settings.email_column,
            pid: settings.pid,
            max_title_length: config.max_title_length,
        }
    }

    /// Email and title checks.
    pub fn inspect(&self, row: &SheetRow) -> Result<CandidateRow, (String, RowRejection)> {
        let email = row.cell(self.email_column).trim().to_string();
        if !is_valid_email(&email) {
            return Err((email, RowRejection::InvalidEmail));
        }

        let titles = split_group_titles(row.cell(self.title_column));
        if titles.is_empty() {
            return Err((email, RowRejection::EmptyGroupTitle));
        }

        if let Some(title) = titles
            .iter()
            .find(|title| title.chars().count() > self.max_title_length)
        {
            let reason = RowRejection::GroupTitleTooLong {
                title: title.clone(),
                max: self.max_title_length,
            };
            return Err((email, reason));
        }

        Ok(CandidateRow { email, titles })
    }

    /// Classify a row, resolving (and creating) its groups when it is valid.
    pub async fn process<S>(
        &self,
        row: &SheetRow,
        resolver: &mut GroupResolver,
        store: &S,
    ) -> Result<RowOutcome, StoreError>
    where
        S: SubscriberStore + ?Sized,
    {
        let candidate = match self.inspect(row) {
            Ok(candidate) => candidate,
            Err((email, reason)) => return Ok(RowOutcome::Rejected { email, reason }),
        };

        let mut groups = GroupSet::new();
        for title in &candidate.titles {
            match resolver.resolve(store, self.pid, title).await? {
                Some(id) => {
                    groups.insert(id);
                }
                None => {
                    return Ok(RowOutcome::Rejected {
                        email: candidate.email,
                        reason: RowRejection::GroupCreationFailed {
                            title: title.clone(),
                        },
                    });
                }
            }
        }

        Ok(RowOutcome::Accepted {
            email: candidate.email,
            groups,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::store::MemoryStore;
    use chrono::Utc;

    fn processor(max_title_length: usize) -> RowProcessor {
        let settings = ImportSettings {
            title_column: 0,
            email_column: 1,
            pid: 9,
            has_title_row: false,
        };
        let config = ImportConfig {
            max_title_length,
            ..ImportConfig::default()
        };
        RowProcessor::new(&settings, &config)
    }

    fn row(title: &str, email: &str) -> SheetRow {
        SheetRow {
            number: 4,
            cells: vec![title.to_string(), email.to_string()],
        }
    }

    #[test]
    fn email_validation_accepts_standard_forms() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last+tag@sub.example.org"));
        assert!(is_valid_email("o'brien@example.ie"));
    }

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        for email in [
            "",
            "not-an-email",
            "@example.com",
            "user@",
            "user@@example.com",
            "user@exa mple.com",
            "user@-example.com",
            "user name@example.com",
        ] {
            assert!(!is_valid_email(email), "{email} should be rejected");
        }
        let long_local = format!("{}@example.com", "a".repeat(250));
        assert!(!is_valid_email(&long_local));
    }

    #[test]
    fn splits_and_trims_titles() {
        assert_eq!(split_group_titles(" Sales , VIP,, "), vec!["Sales", "VIP"]);
        assert!(split_group_titles(" , ,").is_empty());
        assert!(split_group_titles("").is_empty());
    }

    #[test]
    fn trims_email_cell() {
        let candidate = processor(255).inspect(&row("Sales", "  a@x.com ")).expect("valid");
        assert_eq!(candidate.email, "a@x.com");
        assert_eq!(candidate.titles, vec!["Sales"]);
    }

    #[test]
    fn invalid_email_wins_over_empty_title() {
        let rejection = processor(255).inspect(&row("", "not-an-email"));
        assert_eq!(
            rejection,
            Err(("not-an-email".to_string(), RowRejection::InvalidEmail))
        );
    }

    #[test]
    fn missing_cells_read_as_empty() {
        let short = SheetRow {
            number: 2,
            cells: vec!["Sales".to_string()],
        };
        let rejection = processor(255).inspect(&short);
        assert_eq!(rejection, Err((String::new(), RowRejection::InvalidEmail)));
    }

    #[test]
    fn title_length_counts_characters() {
        let processor = processor(4);
        assert!(processor.inspect(&row("Çüöß", "a@x.com")).is_ok());

        let rejection = processor.inspect(&row("Ok,Toolong", "a@x.com"));
        let (_, reason) = rejection.expect_err("too long");
        assert_eq!(
            reason,
            RowRejection::GroupTitleTooLong {
                title: "Toolong".to_string(),
                max: 4,
            }
        );
        assert_eq!(
            reason.to_string(),
            "Group title \"Toolong\" exceeds max length of 4"
        );
    }

    #[tokio::test]
    async fn over_length_row_touches_no_group() {
        let store = MemoryStore::new();
        let mut resolver = GroupResolver::new(Utc::now());

        let outcome = processor(5)
            .process(&row("Sales,Marketing", "a@x.com"), &mut resolver, &store)
            .await
            .expect("process");

        assert!(matches!(
            outcome,
            RowOutcome::Rejected {
                reason: RowRejection::GroupTitleTooLong { .. },
                ..
            }
        ));
        assert_eq!(store.calls().find_group, 0);
        assert!(store.groups(9).is_empty());
    }

    #[tokio::test]
    async fn accepted_row_carries_deduplicated_groups() {
        let store = MemoryStore::new();
        let mut resolver = GroupResolver::new(Utc::now());

        let outcome = processor(255)
            .process(&row("Sales,VIP,Sales", "b@x.com"), &mut resolver, &store)
            .await
            .expect("process");

        let RowOutcome::Accepted { email, groups } = outcome else {
            panic!("row should be accepted");
        };
        assert_eq!(email, "b@x.com");
        assert_eq!(groups.len(), 2);
        assert_eq!(store.groups(9).len(), 2);
    }

    #[tokio::test]
    async fn refused_group_rejects_row() {
        let store = MemoryStore::new();
        store.refuse_group("Locked");
        let mut resolver = GroupResolver::new(Utc::now());

        let outcome = processor(255)
            .process(&row("Locked", "c@x.com"), &mut resolver, &store)
            .await
            .expect("process");

        assert_eq!(
            outcome,
            RowOutcome::Rejected {
                email: "c@x.com".to_string(),
                reason: RowRejection::GroupCreationFailed {
                    title: "Locked".to_string()
                },
            }
        );
    }
}
