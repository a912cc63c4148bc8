//! Ticket lookup DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::service::Ticket;

/// Query string for `GET /api/tickets`.
#[derive(Debug, Deserialize, IntoParams)]
pub struct TicketQuery {
    /// Ticket token handed to the guest at reservation time.
    #[serde(default)]
    pub token: Option<String>,
}

/// Event fields shown on a ticket.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketEventDto {
    /// Event identifier.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
}

/// Host fields shown on a ticket.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketHostDto {
    /// Host user identifier.
    pub id: String,
    /// Host display name.
    pub name: String,
}

/// Response body for `GET /api/tickets`.
#[derive(Debug, Serialize, ToSchema)]
pub struct TicketResponse {
    /// Always `true`.
    pub success: bool,
    /// Reservation identifier.
    pub reservation_id: Uuid,
    /// `reserved` or `cancelled`.
    pub status: String,
    /// Seats on the ticket.
    pub attendee_count: u32,
    /// Reservation timestamp.
    pub reserved_at: DateTime<Utc>,
    /// Reserved event.
    pub event: TicketEventDto,
    /// Event host.
    pub host: TicketHostDto,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        let Ticket { reservation, event } = ticket;
        Self {
            success: true,
            reservation_id: reservation.id.into(),
            status: reservation.status.as_str().to_string(),
            attendee_count: reservation.attendee_count,
            reserved_at: reservation.reserved_at,
            event: TicketEventDto {
                id: event.id.into(),
                title: event.title,
                starts_at: event.starts_at,
            },
            host: TicketHostDto {
                id: event.host_id,
                name: event.host_name,
            },
        }
    }
}
