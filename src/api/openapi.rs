//! OpenAPI document for the gateway.

use axum::Json;
use axum::response::IntoResponse;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::dto::{
    CancelReservationRequest, CancelReservationResponse, ConfirmExpectation,
    ConfirmReservationRequest, ConfirmReservationResponse, CreateEventRequest,
    CreateReservationRequest, CreateReservationResponse, DraftDto, DraftResponse, EventDto,
    EventResponse, GenerateDraftsRequest, GenerateDraftsResponse, PaymentDto, PostDto,
    PostListResponse, PostResponse, PublishRequest, RecountResponse, ReservationDto,
    ReservationListResponse, SaveDraftRequest, TicketEventDto, TicketHostDto, TicketResponse,
    UnpublishModeDto, UnpublishRequest, UnpublishResponse,
};
use crate::api::handlers::{blog, events, reservations, system, tickets};
use crate::content::DraftPayload;
use crate::error::ErrorResponse;
use crate::reconcile::{ConfirmationPhase, ReserveControl, SessionView};

/// Path the JSON document is served from.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "popera-gateway",
        description = "Event reservations, guest tickets and blog publishing."
    ),
    paths(
        system::health_handler,
        reservations::create_reservation,
        reservations::cancel_reservation,
        reservations::confirm_reservation,
        reservations::list_user_reservations,
        events::create_event,
        events::get_event,
        events::recount_event,
        tickets::get_ticket,
        blog::generate_drafts,
        blog::save_draft,
        blog::publish_draft,
        blog::unpublish_post,
        blog::list_posts,
    ),
    components(schemas(
        ErrorResponse,
        system::HealthResponse,
        PaymentDto,
        ReservationDto,
        EventDto,
        CreateReservationRequest,
        CreateReservationResponse,
        CancelReservationRequest,
        CancelReservationResponse,
        ConfirmExpectation,
        ConfirmReservationRequest,
        ConfirmReservationResponse,
        ReservationListResponse,
        SessionView,
        ReserveControl,
        ConfirmationPhase,
        CreateEventRequest,
        EventResponse,
        RecountResponse,
        TicketEventDto,
        TicketHostDto,
        TicketResponse,
        GenerateDraftsRequest,
        GenerateDraftsResponse,
        DraftPayload,
        SaveDraftRequest,
        DraftDto,
        DraftResponse,
        PublishRequest,
        PostDto,
        PostResponse,
        PostListResponse,
        UnpublishModeDto,
        UnpublishRequest,
        UnpublishResponse,
    )),
    modifiers(&AdminTokenScheme),
    tags(
        (name = "System", description = "Health"),
        (name = "Reservations", description = "Reservation writes and confirmation"),
        (name = "Events", description = "Event administration"),
        (name = "Tickets", description = "Guest ticket lookup"),
        (name = "Blog", description = "Blog drafts and posts"),
    )
)]
pub struct ApiDoc;

/// Registers the `admin_token` bearer scheme referenced by admin paths.
#[derive(Debug)]
struct AdminTokenScheme;

impl Modify for AdminTokenScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "admin_token",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}

/// `GET /api-docs/openapi.json` when Swagger UI is compiled out.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
