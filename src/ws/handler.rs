//! Axum WebSocket upgrade handler.

use axum::extract::State;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::HeaderMap;
use axum::response::IntoResponse;

use super::connection::{WsAccess, run_connection};
use crate::api::auth::bearer_token;
use crate::app_state::AppState;

/// `GET /ws`: Upgrade HTTP connection to WebSocket.
///
/// A valid admin bearer token upgrades the connection to [`WsAccess::Admin`].
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let access = if bearer_token(&headers).is_some_and(|token| state.admin.verify(token)) {
        WsAccess::Admin
    } else {
        WsAccess::Public
    };
    let event_rx = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| run_connection(socket, event_rx, access))
}
