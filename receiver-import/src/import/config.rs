use std::env;

/// Pending new subscribers that trigger a bulk insert.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Length of the group title column when the schema cannot tell us.
pub const DEFAULT_MAX_TITLE_LENGTH: usize = 255;

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Tunables for one import run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportConfig {
    pub batch_size: usize,
    pub max_title_length: usize,
}

impl ImportConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_usize("RECEIVER_IMPORT_BATCH_SIZE", DEFAULT_BATCH_SIZE).max(1),
            max_title_length: env_usize(
                "RECEIVER_IMPORT_MAX_TITLE_LENGTH",
                DEFAULT_MAX_TITLE_LENGTH,
            ),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Prefer the length declared by the schema over the configured one.
    pub fn with_title_limit(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.max_title_length = limit;
        }
        self
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_title_length: DEFAULT_MAX_TITLE_LENGTH,
        }
    }
}
