//! Blog drafts and posts.
//!
//! Drafts and posts live in separate collections. Publishing copies a
//! draft into the posts collection under a unique slug and then deletes
//! the draft; there is no status transition on a single row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{DraftId, PostId};

/// An editable, unpublished article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogDraft {
    /// Draft identifier.
    pub id: DraftId,
    /// Article title.
    pub title: String,
    /// Preferred slug; uniqueness is only enforced at publish time.
    pub slug: String,
    /// Short summary.
    pub excerpt: String,
    /// Sanitized HTML body.
    pub content: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last upsert timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Visibility of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Publicly listed.
    Published,
    /// Hidden but retained.
    Archived,
}

impl PostStatus {
    /// Returns the storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Published => "published",
            Self::Archived => "archived",
        }
    }

    /// Parses the storage representation.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "published" => Some(Self::Published),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

/// A published article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogPost {
    /// Post identifier.
    pub id: PostId,
    /// Draft this post was promoted from.
    pub source_draft_id: Option<DraftId>,
    /// Article title.
    pub title: String,
    /// Unique slug.
    pub slug: String,
    /// Short summary.
    pub excerpt: String,
    /// Sanitized HTML body.
    pub content: String,
    /// Free-form tags.
    pub tags: Vec<String>,
    /// Visibility.
    pub status: PostStatus,
    /// Publication timestamp.
    pub published_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}
