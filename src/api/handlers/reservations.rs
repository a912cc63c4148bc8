//! Reservation handlers: create, cancel, confirm, list.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CancelReservationRequest, CancelReservationResponse, ConfirmExpectation,
    ConfirmReservationRequest, ConfirmReservationResponse, CreateReservationRequest,
    CreateReservationResponse, ReservationDto, ReservationListResponse,
};
use crate::app_state::AppState;
use crate::domain::{EventId, UserId};
use crate::error::{ErrorResponse, GatewayError};
use crate::reconcile::{Expectation, ReservationSession, ReserveOutcome};

fn session_for(state: &AppState, user_id: UserId, event_id: EventId) -> ReservationSession {
    ReservationSession::new(
        user_id,
        event_id,
        Arc::clone(&state.reservation_service),
        state.confirmation_poller.clone(),
        state.optimistic_revert,
    )
}

fn user_id(raw: String) -> Result<UserId, GatewayError> {
    let user_id = UserId::new(raw);
    if user_id.is_blank() {
        return Err(GatewayError::InvalidRequest("missing user_id".to_string()));
    }
    Ok(user_id)
}

/// `POST /api/reservations`: Reserve and wait for confirmation.
///
/// # Errors
///
/// Returns [`GatewayError`] if validation or the write fails.
#[utoipa::path(
    post,
    path = "/api/reservations",
    tag = "Reservations",
    summary = "Create a reservation",
    description = "Writes the reservation, then polls the user's reservation list until it is visible. Responds 201 when confirmed and 202 when the write succeeded but could not be confirmed in time; both carry the one-time ticket token.",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation created and confirmed", body = CreateReservationResponse),
        (status = 202, description = "Reservation created, confirmation pending", body = CreateReservationResponse),
        (status = 400, description = "Invalid request or event full", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
        (status = 409, description = "Already reserved", body = ErrorResponse),
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user_id = user_id(req.user_id)?;
    let mut session = session_for(&state, user_id, EventId::from_uuid(req.event_id));
    session.load().await?;

    let outcome = session
        .reserve(req.attendee_count, req.payment.map(Into::into))
        .await?;
    let (status, confirmed, attempts, created) = match outcome {
        ReserveOutcome::Confirmed { created, attempts } => {
            (StatusCode::CREATED, true, attempts, created)
        }
        ReserveOutcome::Unconfirmed { created, attempts } => {
            (StatusCode::ACCEPTED, false, attempts, created)
        }
    };

    Ok((
        status,
        Json(CreateReservationResponse {
            success: true,
            confirmed,
            attempts,
            reservation: created.reservation.into(),
            ticket_token: created.ticket_token,
            session: session.view(),
        }),
    ))
}

/// `POST /api/reservations/cancel`: Cancel and wait for confirmation.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if there is no active reservation.
#[utoipa::path(
    post,
    path = "/api/reservations/cancel",
    tag = "Reservations",
    summary = "Cancel a reservation",
    description = "Cancels the user's active reservation for the event and polls until it drops out of the list.",
    request_body = CancelReservationRequest,
    responses(
        (status = 200, description = "Reservation cancelled", body = CancelReservationResponse),
        (status = 404, description = "No active reservation", body = ErrorResponse),
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Json(req): Json<CancelReservationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user_id = user_id(req.user_id)?;
    let mut session = session_for(&state, user_id, EventId::from_uuid(req.event_id));
    session.load().await?;
    let cancelled = session.cancel().await?;

    Ok(Json(CancelReservationResponse {
        success: true,
        reservation: cancelled.into(),
        session: session.view(),
    }))
}

/// `POST /api/reservations/confirm`: Run the confirmation poller.
///
/// # Errors
///
/// Returns [`GatewayError::ConfirmationTimeout`] (202) when attempts run out.
#[utoipa::path(
    post,
    path = "/api/reservations/confirm",
    tag = "Reservations",
    summary = "Confirm a reservation write",
    description = "Polls the user's reservation list with the configured policy until an active reservation for the event is present (or absent).",
    request_body = ConfirmReservationRequest,
    responses(
        (status = 200, description = "Write observed", body = ConfirmReservationResponse),
        (status = 202, description = "Not observed within the polling budget", body = ErrorResponse),
    )
)]
pub async fn confirm_reservation(
    State(state): State<AppState>,
    Json(req): Json<ConfirmReservationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let user_id = user_id(req.user_id)?;
    let expectation = match req.expect {
        ConfirmExpectation::Present => Expectation::Present,
        ConfirmExpectation::Absent => Expectation::Absent,
    };
    let outcome = state
        .confirmation_poller
        .confirm(&user_id, EventId::from_uuid(req.event_id), expectation)
        .await?;
    let attempts = outcome.attempts();
    let reservation = outcome.into_result()?;

    Ok(Json(ConfirmReservationResponse {
        success: true,
        confirmed: true,
        attempts,
        reservation: reservation.map(ReservationDto::from),
    }))
}

/// `GET /api/users/{user_id}/reservations`: List a user's reservations.
///
/// # Errors
///
/// Returns [`GatewayError`] on store failure.
#[utoipa::path(
    get,
    path = "/api/users/{user_id}/reservations",
    tag = "Reservations",
    summary = "List a user's reservations",
    description = "Reads the eventually consistent per-user index. Recent writes may be missing.",
    params(
        ("user_id" = String, Path, description = "User identifier"),
    ),
    responses(
        (status = 200, description = "Reservations", body = ReservationListResponse),
    )
)]
pub async fn list_user_reservations(
    State(state): State<AppState>,
    Path(raw_user_id): Path<String>,
) -> Result<impl IntoResponse, GatewayError> {
    let user_id = user_id(raw_user_id)?;
    let rows = state.reservation_service.list_for_user(&user_id).await?;
    Ok(Json(ReservationListResponse {
        success: true,
        data: rows.into_iter().map(ReservationDto::from).collect(),
    }))
}

/// Reservation routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/reservations", post(create_reservation))
        .route("/api/reservations/cancel", post(cancel_reservation))
        .route("/api/reservations/confirm", post(confirm_reservation))
        .route(
            "/api/users/{user_id}/reservations",
            get(list_user_reservations),
        )
}
