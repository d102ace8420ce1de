//! Liveness probe.

use crate::models::DataResponse;
use rocket::get;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Answers as long as the process can serve requests; touches no database.
#[get("/health/live")]
pub fn live_health() -> Json<DataResponse<HealthResponse>> {
    Json(DataResponse {
        data: HealthResponse {
            status: "ok".to_string(),
        },
    })
}
