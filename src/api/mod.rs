//! REST API layer: route handlers, DTOs, extractors and router composition.
//!
//! Resource endpoints live under `/api`; `/health`, `/ws` and the OpenAPI
//! document are mounted at the root.

pub mod auth;
pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use axum::routing::get;

use crate::app_state::AppState;
use crate::error::GatewayError;
use crate::ws::handler::ws_handler;

/// Builds the complete router with all REST and WebSocket endpoints.
///
/// Requests with a method a route does not accept get a JSON 405 body
/// instead of axum's empty default.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .merge(handlers::routes())
        .merge(handlers::system::routes())
        .route("/ws", get(ws_handler))
        .method_not_allowed_fallback(method_not_allowed);

    with_docs(router)
}

async fn method_not_allowed() -> GatewayError {
    GatewayError::MethodNotAllowed
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    use utoipa::OpenApi;
    use utoipa_swagger_ui::SwaggerUi;

    router.merge(
        SwaggerUi::new("/swagger-ui").url(openapi::OPENAPI_JSON_PATH, openapi::ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.route(openapi::OPENAPI_JSON_PATH, get(openapi::openapi_json))
}
