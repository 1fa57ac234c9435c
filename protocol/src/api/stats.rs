//! Stats API DTOs
//!
//! GET /stats returns `Stats` as `data`; the other dashboard endpoints return
//! image or person lists.

use serde::{Deserialize, Serialize};

pub use crate::common::Stats;

/// Body of GET /health. It is not wrapped in the usual envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}
