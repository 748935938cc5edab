//! Item entity.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A named, weighted unit of cargo. `mover_id` points at the mover currently
/// holding it; `None` means unassigned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub weight: i64,
    pub mover_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
