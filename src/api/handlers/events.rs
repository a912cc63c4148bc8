//! Event handlers: create, get, recount.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use uuid::Uuid;

use crate::api::auth::AdminAuth;
use crate::api::dto::{CreateEventRequest, EventResponse, RecountResponse, parse_pricing};
use crate::app_state::AppState;
use crate::domain::EventId;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::NewEvent;

/// `POST /api/events`: Create an event.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] on invalid input.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    summary = "Create an event",
    request_body = CreateEventRequest,
    security(("admin_token" = [])),
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
    )
)]
pub async fn create_event(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let pricing_type = parse_pricing(&req.pricing_type)?;
    let event = state
        .reservation_service
        .create_event(NewEvent {
            host_id: req.host_id,
            host_name: req.host_name,
            title: req.title,
            starts_at: req.starts_at,
            capacity: req.capacity,
            pricing_type,
            fee_amount: req.fee_amount,
            currency: req.currency,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(EventResponse {
            success: true,
            event: event.into(),
        }),
    ))
}

/// `GET /api/events/{id}`: Event detail.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the event does not exist.
#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "Events",
    summary = "Get an event",
    params(
        ("id" = Uuid, Path, description = "Event UUID"),
    ),
    responses(
        (status = 200, description = "Event", body = EventResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let event = state
        .reservation_service
        .require_event(EventId::from_uuid(id))
        .await?;
    Ok(Json(EventResponse {
        success: true,
        event: event.into(),
    }))
}

/// `POST /api/events/{id}/recount`: Recompute the attendee count.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the event does not exist.
#[utoipa::path(
    post,
    path = "/api/events/{id}/recount",
    tag = "Events",
    summary = "Recount attendees",
    description = "Recomputes the cached attendee count from active reservations and reports the drift that was corrected.",
    params(
        ("id" = Uuid, Path, description = "Event UUID"),
    ),
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Recount result", body = RecountResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 404, description = "Event not found", body = ErrorResponse),
    )
)]
pub async fn recount_event(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    let recount = state
        .reservation_service
        .recount_attendees(EventId::from_uuid(id))
        .await?;
    Ok(Json(RecountResponse {
        success: true,
        event_id: recount.event_id.into(),
        previous: recount.previous,
        recomputed: recount.recomputed,
        drift: recount.drift(),
    }))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", post(create_event))
        .route("/api/events/{id}", get(get_event))
        .route("/api/events/{id}/recount", post(recount_event))
}
