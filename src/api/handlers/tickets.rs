//! Public ticket lookup.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::auth::ClientAddr;
use crate::api::dto::{TicketQuery, TicketResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /api/tickets?token=`: Resolve a guest ticket.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] without a token,
/// [`GatewayError::Unauthorized`] for an unknown token, and
/// [`GatewayError::RateLimited`] when a limit is hit.
#[utoipa::path(
    get,
    path = "/api/tickets",
    tag = "Tickets",
    summary = "Look up a ticket",
    description = "Resolves the ticket token to its reservation, event and host. Rate limited per client address, per reservation and per failed lookup.",
    params(TicketQuery),
    responses(
        (status = 200, description = "Ticket", body = TicketResponse),
        (status = 400, description = "Missing token", body = ErrorResponse),
        (status = 403, description = "Unknown token", body = ErrorResponse),
        (status = 429, description = "Rate limited", body = ErrorResponse),
    )
)]
pub async fn get_ticket(
    State(state): State<AppState>,
    ClientAddr(client): ClientAddr,
    Query(query): Query<TicketQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let token = query
        .token
        .ok_or_else(|| GatewayError::InvalidRequest("missing token".to_string()))?;
    let ticket = state.ticket_service.lookup(&token, &client).await?;
    Ok(Json(TicketResponse::from(ticket)))
}

/// Ticket routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/api/tickets", get(get_ticket))
}
