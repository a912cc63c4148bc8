//! Reservation write, confirmation and list DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{PaymentDto, ReservationDto};
use crate::reconcile::SessionView;

/// Request body for `POST /api/reservations`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    /// Reserving user.
    pub user_id: String,
    /// Event to reserve.
    pub event_id: Uuid,
    /// Seats claimed. Defaults to 1.
    #[serde(default = "default_attendees")]
    pub attendee_count: u32,
    /// Payment context, required for online-paid events.
    #[serde(default)]
    pub payment: Option<PaymentDto>,
}

fn default_attendees() -> u32 {
    1
}

/// Response body for `POST /api/reservations`.
///
/// Sent with `201` once the reservation is listed, or with `202` when the
/// write succeeded but was not observed in time. The ticket token is only
/// ever returned here.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateReservationResponse {
    /// Always `true`; the write itself succeeded.
    pub success: bool,
    /// Whether the reservation was observed in the user's list.
    pub confirmed: bool,
    /// List queries performed while confirming.
    pub attempts: u32,
    /// The stored reservation.
    pub reservation: ReservationDto,
    /// Plain ticket token for the guest.
    pub ticket_token: String,
    /// Client view after the flow.
    pub session: SessionView,
}

/// Request body for `POST /api/reservations/cancel`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelReservationRequest {
    /// Owner of the reservation.
    pub user_id: String,
    /// Event the reservation is held against.
    pub event_id: Uuid,
}

/// Response body for `POST /api/reservations/cancel`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelReservationResponse {
    /// Always `true`.
    pub success: bool,
    /// The cancelled reservation.
    pub reservation: ReservationDto,
    /// Client view after the flow.
    pub session: SessionView,
}

/// What `POST /api/reservations/confirm` waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmExpectation {
    /// An active reservation is listed.
    #[default]
    Present,
    /// No active reservation is listed.
    Absent,
}

/// Request body for `POST /api/reservations/confirm`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmReservationRequest {
    /// Owner of the reservation.
    pub user_id: String,
    /// Event the reservation is held against.
    pub event_id: Uuid,
    /// Defaults to `present`.
    #[serde(default)]
    pub expect: ConfirmExpectation,
}

/// Response body for a successful confirmation.
#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmReservationResponse {
    /// Always `true`.
    pub success: bool,
    /// Always `true`; timeouts are reported as errors.
    pub confirmed: bool,
    /// List queries performed.
    pub attempts: u32,
    /// The listed reservation when waiting for presence.
    pub reservation: Option<ReservationDto>,
}

/// Response body for `GET /api/users/{user_id}/reservations`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationListResponse {
    /// Always `true`.
    pub success: bool,
    /// Reservations as currently listed, newest first.
    pub data: Vec<ReservationDto>,
}
