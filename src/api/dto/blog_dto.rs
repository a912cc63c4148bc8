//! Blog admin DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::content::DraftPayload;
use crate::domain::{BlogDraft, BlogPost};

/// Request body for `POST /api/blog/generate`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateDraftsRequest {
    /// Subject of the articles.
    pub topic: String,
    /// Keywords to work in.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Number of payloads, `1..=5`. Defaults to 1.
    #[serde(default = "default_count")]
    pub count: u8,
}

fn default_count() -> u8 {
    1
}

/// Response body for `POST /api/blog/generate`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GenerateDraftsResponse {
    /// Always `true`.
    pub success: bool,
    /// Generated, unsaved payloads.
    pub drafts: Vec<DraftPayload>,
}

/// Request body for `POST /api/blog/save-draft`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SaveDraftRequest {
    /// Draft to replace; omitted to create one.
    #[serde(default)]
    pub id: Option<Uuid>,
    /// Title.
    pub title: String,
    /// Preferred slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Summary.
    #[serde(default)]
    pub excerpt: String,
    /// HTML body.
    #[serde(default)]
    pub content: String,
    /// Tags.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A stored draft.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftDto {
    /// Draft identifier.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Preferred slug.
    pub slug: String,
    /// Summary.
    pub excerpt: String,
    /// Sanitized HTML body.
    pub content: String,
    /// Tags.
    pub tags: Vec<String>,
    /// Last save.
    pub updated_at: DateTime<Utc>,
}

impl From<BlogDraft> for DraftDto {
    fn from(d: BlogDraft) -> Self {
        Self {
            id: d.id.into(),
            title: d.title,
            slug: d.slug,
            excerpt: d.excerpt,
            content: d.content,
            tags: d.tags,
            updated_at: d.updated_at,
        }
    }
}

/// Response body for `POST /api/blog/save-draft`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DraftResponse {
    /// Always `true`.
    pub success: bool,
    /// The saved draft.
    pub draft: DraftDto,
}

/// Request body for `POST /api/blog/publish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PublishRequest {
    /// Draft to publish.
    pub draft_id: Uuid,
}

/// A post.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostDto {
    /// Post identifier.
    pub id: Uuid,
    /// Title.
    pub title: String,
    /// Unique slug.
    pub slug: String,
    /// Summary.
    pub excerpt: String,
    /// Sanitized HTML body.
    pub content: String,
    /// Tags.
    pub tags: Vec<String>,
    /// `published` or `archived`.
    pub status: String,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
}

impl From<BlogPost> for PostDto {
    fn from(p: BlogPost) -> Self {
        Self {
            id: p.id.into(),
            title: p.title,
            slug: p.slug,
            excerpt: p.excerpt,
            content: p.content,
            tags: p.tags,
            status: p.status.as_str().to_string(),
            published_at: p.published_at,
        }
    }
}

/// Response body wrapping a single post.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    /// Always `true`.
    pub success: bool,
    /// The post.
    pub post: PostDto,
}

/// Response body listing posts.
#[derive(Debug, Serialize, ToSchema)]
pub struct PostListResponse {
    /// Always `true`.
    pub success: bool,
    /// Published posts, newest first.
    pub data: Vec<PostDto>,
}

/// How to unpublish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnpublishModeDto {
    /// Remove the post.
    #[default]
    Delete,
    /// Keep the post as `archived`.
    Archive,
}

/// Request body for `POST /api/blog/unpublish`. Exactly one of `post_id`
/// and `slug` must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UnpublishRequest {
    /// Post identifier.
    #[serde(default)]
    pub post_id: Option<Uuid>,
    /// Post slug.
    #[serde(default)]
    pub slug: Option<String>,
    /// Defaults to `delete`.
    #[serde(default)]
    pub mode: UnpublishModeDto,
}

/// Response body for `POST /api/blog/unpublish`.
#[derive(Debug, Serialize, ToSchema)]
pub struct UnpublishResponse {
    /// Always `true`.
    pub success: bool,
    /// Affected post.
    pub post_id: Uuid,
    /// `deleted` or `archived`.
    pub action: String,
}
