//! Blog admin handlers: generate, save-draft, publish, unpublish.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::AdminAuth;
use crate::api::dto::{
    DraftResponse, GenerateDraftsRequest, GenerateDraftsResponse, PostDto, PostListResponse,
    PostResponse, PublishRequest, SaveDraftRequest, UnpublishModeDto, UnpublishRequest,
    UnpublishResponse,
};
use crate::app_state::AppState;
use crate::content::DraftPrompt;
use crate::domain::{DraftId, PostId};
use crate::error::{ErrorResponse, GatewayError};
use crate::service::{DraftInput, PostRef, UnpublishMode, Unpublished};

/// `POST /api/blog/generate`: Generate draft payloads.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a blank topic or a count
/// outside `1..=5`.
#[utoipa::path(
    post,
    path = "/api/blog/generate",
    tag = "Blog",
    summary = "Generate drafts",
    description = "Returns one to five draft payloads for a topic. Nothing is stored.",
    request_body = GenerateDraftsRequest,
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Generated drafts", body = GenerateDraftsResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
    )
)]
pub async fn generate_drafts(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<GenerateDraftsRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let drafts = state
        .blog_service
        .generate(DraftPrompt {
            topic: req.topic,
            keywords: req.keywords,
            count: req.count,
        })
        .await?;
    Ok(Json(GenerateDraftsResponse {
        success: true,
        drafts,
    }))
}

/// `POST /api/blog/save-draft`: Insert or replace a draft.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a blank title.
#[utoipa::path(
    post,
    path = "/api/blog/save-draft",
    tag = "Blog",
    summary = "Save a draft",
    request_body = SaveDraftRequest,
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Saved draft", body = DraftResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
    )
)]
pub async fn save_draft(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<SaveDraftRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let draft = state
        .blog_service
        .save_draft(DraftInput {
            id: req.id.map(DraftId::from_uuid),
            title: req.title,
            slug: req.slug,
            excerpt: req.excerpt,
            content: req.content,
            tags: req.tags,
        })
        .await?;
    Ok(Json(DraftResponse {
        success: true,
        draft: draft.into(),
    }))
}

/// `POST /api/blog/publish`: Promote a draft to a post.
///
/// # Errors
///
/// Returns [`GatewayError::NotFound`] if the draft does not exist.
#[utoipa::path(
    post,
    path = "/api/blog/publish",
    tag = "Blog",
    summary = "Publish a draft",
    description = "Copies the draft into the posts collection under a unique slug, then deletes the draft.",
    request_body = PublishRequest,
    security(("admin_token" = [])),
    responses(
        (status = 201, description = "Published post", body = PostResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 404, description = "Draft not found", body = ErrorResponse),
    )
)]
pub async fn publish_draft(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<PublishRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let post = state
        .blog_service
        .publish(DraftId::from_uuid(req.draft_id))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            success: true,
            post: post.into(),
        }),
    ))
}

/// `POST /api/blog/unpublish`: Delete or archive a post.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] unless exactly one of `post_id`
/// and `slug` is given, or [`GatewayError::NotFound`] for an unknown post.
#[utoipa::path(
    post,
    path = "/api/blog/unpublish",
    tag = "Blog",
    summary = "Unpublish a post",
    request_body = UnpublishRequest,
    security(("admin_token" = [])),
    responses(
        (status = 200, description = "Post unpublished", body = UnpublishResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Missing or invalid admin token", body = ErrorResponse),
        (status = 404, description = "Post not found", body = ErrorResponse),
    )
)]
pub async fn unpublish_post(
    _admin: AdminAuth,
    State(state): State<AppState>,
    Json(req): Json<UnpublishRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let slug = req
        .slug
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let target = match (req.post_id, slug) {
        (Some(id), None) => PostRef::Id(PostId::from_uuid(id)),
        (None, Some(slug)) => PostRef::Slug(slug),
        _ => {
            return Err(GatewayError::InvalidRequest(
                "exactly one of post_id and slug is required".to_string(),
            ));
        }
    };
    let mode = match req.mode {
        UnpublishModeDto::Delete => UnpublishMode::Delete,
        UnpublishModeDto::Archive => UnpublishMode::Archive,
    };

    let (post_id, action) = match state.blog_service.unpublish(target, mode).await? {
        Unpublished::Deleted(id) => (id, "deleted"),
        Unpublished::Archived(post) => (post.id, "archived"),
    };
    Ok(Json(UnpublishResponse {
        success: true,
        post_id: post_id.into(),
        action: action.to_string(),
    }))
}

/// `GET /api/blog/posts`: Published posts.
///
/// # Errors
///
/// Returns [`GatewayError::PersistenceError`] if the query fails.
#[utoipa::path(
    get,
    path = "/api/blog/posts",
    tag = "Blog",
    summary = "List published posts",
    responses(
        (status = 200, description = "Published posts, newest first", body = PostListResponse),
    )
)]
pub async fn list_posts(State(state): State<AppState>) -> Result<impl IntoResponse, GatewayError> {
    let posts = state.blog_service.list_published().await?;
    Ok(Json(PostListResponse {
        success: true,
        data: posts.into_iter().map(PostDto::from).collect(),
    }))
}

/// Blog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/blog/generate", post(generate_drafts))
        .route("/api/blog/save-draft", post(save_draft))
        .route("/api/blog/publish", post(publish_draft))
        .route("/api/blog/unpublish", post(unpublish_post))
        .route("/api/blog/posts", get(list_posts))
}
