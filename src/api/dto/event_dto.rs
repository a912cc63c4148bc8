//! Event DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::EventDto;

/// Request body for `POST /api/events`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateEventRequest {
    /// Host user identifier.
    pub host_id: String,
    /// Host display name.
    #[serde(default)]
    pub host_name: String,
    /// Title.
    pub title: String,
    /// Scheduled start (ISO-8601).
    pub starts_at: DateTime<Utc>,
    /// Attendee limit.
    #[serde(default)]
    pub capacity: Option<u32>,
    /// `free`, `online` or `door`. Defaults to `free`.
    #[serde(default = "default_pricing")]
    pub pricing_type: String,
    /// Fee per attendee in the smallest currency unit.
    #[serde(default)]
    pub fee_amount: Option<i64>,
    /// Currency code.
    #[serde(default)]
    pub currency: Option<String>,
}

fn default_pricing() -> String {
    "free".to_string()
}

/// Response body wrapping a single event.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventResponse {
    /// Always `true`.
    pub success: bool,
    /// The event.
    pub event: EventDto,
}

/// Response body for `POST /api/events/{id}/recount`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RecountResponse {
    /// Always `true`.
    pub success: bool,
    /// Recounted event.
    pub event_id: Uuid,
    /// Cached count before the recount.
    pub previous: i64,
    /// Count recomputed from active reservations.
    pub recomputed: i64,
    /// `previous - recomputed`.
    pub drift: i64,
}
