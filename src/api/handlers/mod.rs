//! REST endpoint handlers organized by resource.

pub mod blog;
pub mod events;
pub mod reservations;
pub mod system;
pub mod tickets;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(reservations::routes())
        .merge(events::routes())
        .merge(tickets::routes())
        .merge(blog::routes())
}
