//! HTTP route handlers.
//!
//! Everything is mounted under `/api/v1`.

pub mod health;
pub mod import;
