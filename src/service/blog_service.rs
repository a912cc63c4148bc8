//! Blog drafts, publishing and unpublishing.
//!
//! Publishing copies a draft into the posts collection under a unique slug
//! and then deletes the draft. Slugs are de-duplicated by trying the base
//! slug, then `base-2` through `base-99`, then `base-<unix millis>`. All
//! content passes through the [`Sanitizer`] before it is stored.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;

use crate::content::generator::MAX_DRAFTS_PER_REQUEST;
use crate::content::slug::numbered;
use crate::content::{DraftGenerator, DraftPayload, DraftPrompt, Sanitizer, slugify};
use crate::domain::{BlogDraft, BlogPost, BlogStore, DraftId, PostId, PostStatus};
use crate::error::GatewayError;

/// Highest numeric suffix tried before falling back to a timestamp.
pub const MAX_NUMBERED_SUFFIX: u32 = 99;

const PUBLISH_RETRIES: u32 = 3;

/// Input for a draft upsert.
#[derive(Debug, Clone, Default)]
pub struct DraftInput {
    /// Existing draft to replace; a new draft is created when `None`.
    pub id: Option<DraftId>,
    /// Article title.
    pub title: String,
    /// Preferred slug; derived from the title when absent.
    pub slug: Option<String>,
    /// Short summary.
    pub excerpt: String,
    /// HTML body, sanitized before storage.
    pub content: String,
    /// Free-form tags.
    pub tags: Vec<String>,
}

/// Post selector for unpublishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRef {
    /// By id.
    Id(PostId),
    /// By slug.
    Slug(String),
}

impl fmt::Display for PostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "post {id}"),
            Self::Slug(slug) => write!(f, "post with slug {slug:?}"),
        }
    }
}

/// What unpublishing does with the post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnpublishMode {
    /// Remove the post.
    #[default]
    Delete,
    /// Keep the post with status `archived`.
    Archive,
}

/// Result of an unpublish call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unpublished {
    /// The post was removed.
    Deleted(PostId),
    /// The post was archived.
    Archived(BlogPost),
}

/// Admin blog operations.
#[derive(Debug, Clone)]
pub struct BlogService {
    store: Arc<dyn BlogStore>,
    generator: Arc<dyn DraftGenerator>,
    sanitizer: Sanitizer,
}

impl BlogService {
    /// Creates a new `BlogService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn BlogStore>,
        generator: Arc<dyn DraftGenerator>,
        sanitizer: Sanitizer,
    ) -> Self {
        Self {
            store,
            generator,
            sanitizer,
        }
    }

    /// Generates draft payloads. Nothing is persisted.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank topic or a
    /// count outside `1..=5`, or the generator's error.
    pub async fn generate(&self, prompt: DraftPrompt) -> Result<Vec<DraftPayload>, GatewayError> {
        if prompt.topic.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("missing topic".to_string()));
        }
        if !(1..=MAX_DRAFTS_PER_REQUEST).contains(&prompt.count) {
            return Err(GatewayError::InvalidRequest(format!(
                "count must be between 1 and {MAX_DRAFTS_PER_REQUEST}"
            )));
        }
        let mut drafts = self.generator.generate(&prompt).await?;
        for draft in &mut drafts {
            draft.content = self.sanitizer.sanitize(&draft.content);
        }
        tracing::info!(topic = %prompt.topic, count = drafts.len(), "drafts generated");
        Ok(drafts)
    }

    /// Inserts or replaces a draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank title, or
    /// [`GatewayError::PersistenceError`] if the write fails.
    pub async fn save_draft(&self, input: DraftInput) -> Result<BlogDraft, GatewayError> {
        if input.title.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("missing title".to_string()));
        }
        let now = Utc::now();
        let existing = match input.id {
            Some(id) => self.store.get_draft(id).await?,
            None => None,
        };
        let slug = input
            .slug
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map_or_else(|| slugify(&input.title), slugify);

        let draft = BlogDraft {
            id: input.id.unwrap_or_default(),
            slug,
            excerpt: input.excerpt.trim().to_string(),
            content: self.sanitizer.sanitize(&input.content),
            tags: input.tags,
            created_at: existing.map_or(now, |d| d.created_at),
            updated_at: now,
            title: input.title.trim().to_string(),
        };
        let saved = self.store.upsert_draft(draft).await?;
        tracing::info!(draft_id = %saved.id, slug = %saved.slug, "draft saved");
        Ok(saved)
    }

    /// Promotes a draft to a published post and deletes the draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the draft does not exist, or
    /// [`GatewayError::PersistenceError`] if a write fails.
    pub async fn publish(&self, draft_id: DraftId) -> Result<BlogPost, GatewayError> {
        let draft = self
            .store
            .get_draft(draft_id)
            .await?
            .ok_or_else(|| GatewayError::NotFound(format!("draft {draft_id}")))?;

        let base = slugify(&draft.slug);
        let mut attempt = 0;
        let post = loop {
            attempt += 1;
            let now = Utc::now();
            let post = BlogPost {
                id: PostId::new(),
                source_draft_id: Some(draft.id),
                title: draft.title.clone(),
                slug: self.unique_slug(&base).await?,
                excerpt: draft.excerpt.clone(),
                content: self.sanitizer.sanitize(&draft.content),
                tags: draft.tags.clone(),
                status: PostStatus::Published,
                published_at: now,
                updated_at: now,
            };
            match self.store.insert_post(post).await {
                Ok(post) => break post,
                Err(GatewayError::Conflict(reason)) if attempt < PUBLISH_RETRIES => {
                    tracing::debug!(%draft_id, %reason, "slug taken concurrently; retrying");
                }
                Err(err) => return Err(err),
            }
        };

        if !self.store.delete_draft(draft_id).await? {
            tracing::warn!(%draft_id, "draft vanished before it could be deleted");
        }
        tracing::info!(post_id = %post.id, slug = %post.slug, %draft_id, "post published");
        Ok(post)
    }

    /// Deletes or archives a post.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the post does not exist, or
    /// [`GatewayError::PersistenceError`] if a write fails.
    pub async fn unpublish(
        &self,
        target: PostRef,
        mode: UnpublishMode,
    ) -> Result<Unpublished, GatewayError> {
        let post = match &target {
            PostRef::Id(id) => self.store.get_post(*id).await?,
            PostRef::Slug(slug) => self.store.get_post_by_slug(slug).await?,
        }
        .ok_or_else(|| GatewayError::NotFound(target.to_string()))?;

        match mode {
            UnpublishMode::Delete => {
                if !self.store.delete_post(post.id).await? {
                    return Err(GatewayError::NotFound(format!("post {}", post.id)));
                }
                tracing::info!(post_id = %post.id, slug = %post.slug, "post deleted");
                Ok(Unpublished::Deleted(post.id))
            }
            UnpublishMode::Archive => {
                let archived = self
                    .store
                    .set_post_status(post.id, PostStatus::Archived)
                    .await?;
                tracing::info!(post_id = %archived.id, slug = %archived.slug, "post archived");
                Ok(Unpublished::Archived(archived))
            }
        }
    }

    /// Published posts, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the query fails.
    pub async fn list_published(&self) -> Result<Vec<BlogPost>, GatewayError> {
        self.store.list_posts(Some(PostStatus::Published)).await
    }

    /// First free slug for `base`.
    async fn unique_slug(&self, base: &str) -> Result<String, GatewayError> {
        for n in 1..=MAX_NUMBERED_SUFFIX {
            let candidate = numbered(base, n);
            if !self.store.post_slug_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        let mut stamp = Utc::now().timestamp_millis();
        loop {
            let candidate = format!("{base}-{stamp}");
            if !self.store.post_slug_exists(&candidate).await? {
                return Ok(candidate);
            }
            stamp = stamp.saturating_add(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::content::OutlineGenerator;
    use crate::domain::MemoryStore;

    fn make_service() -> BlogService {
        let Ok(sanitizer) = Sanitizer::new() else {
            panic!("sanitizer failed to build");
        };
        BlogService::new(
            Arc::new(MemoryStore::consistent()),
            Arc::new(OutlineGenerator),
            sanitizer,
        )
    }

    fn draft(title: &str) -> DraftInput {
        DraftInput {
            title: title.to_string(),
            excerpt: "summer round-up".to_string(),
            content: "<p>Hi</p><script>alert(1)</script>".to_string(),
            ..DraftInput::default()
        }
    }

    #[tokio::test]
    async fn save_draft_sanitizes_and_derives_slug() {
        let service = make_service();
        let Ok(saved) = service.save_draft(draft("Summer Pop-Ups 2026")).await else {
            panic!("save failed");
        };
        assert_eq!(saved.slug, "summer-pop-ups-2026");
        assert_eq!(saved.content, "<p>Hi</p>");

        let mut update = draft("Summer Pop-Ups 2026");
        update.id = Some(saved.id);
        update.slug = Some("Custom Slug".to_string());
        let Ok(updated) = service.save_draft(update).await else {
            panic!("update failed");
        };
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated.slug, "custom-slug");
        assert_eq!(updated.created_at, saved.created_at);
    }

    #[tokio::test]
    async fn publish_moves_draft_to_posts() {
        let service = make_service();
        let Ok(saved) = service.save_draft(draft("Night Markets")).await else {
            panic!("save failed");
        };
        let Ok(post) = service.publish(saved.id).await else {
            panic!("publish failed");
        };
        assert_eq!(post.slug, "night-markets");
        assert_eq!(post.source_draft_id, Some(saved.id));
        assert!(matches!(
            service.publish(saved.id).await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn hundred_publishes_of_one_title_never_collide() {
        let service = make_service();
        let mut slugs = HashSet::new();
        for _ in 0..100 {
            let Ok(saved) = service.save_draft(draft("Same Title")).await else {
                panic!("save failed");
            };
            let Ok(post) = service.publish(saved.id).await else {
                panic!("publish failed");
            };
            assert!(slugs.insert(post.slug));
        }
        assert_eq!(slugs.len(), 100);
        assert!(slugs.contains("same-title"));
        assert!(slugs.contains("same-title-2"));
        assert!(slugs.contains("same-title-99"));
        assert_eq!(
            slugs
                .iter()
                .filter(|s| s.len() > "same-title-99".len())
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn unpublish_deletes_by_default_and_archives_on_request() {
        let service = make_service();
        let Ok(a) = service.save_draft(draft("First")).await else {
            panic!("save failed");
        };
        let Ok(b) = service.save_draft(draft("Second")).await else {
            panic!("save failed");
        };
        let Ok(first) = service.publish(a.id).await else {
            panic!("publish failed");
        };
        let Ok(second) = service.publish(b.id).await else {
            panic!("publish failed");
        };

        let Ok(deleted) = service
            .unpublish(PostRef::Id(first.id), UnpublishMode::default())
            .await
        else {
            panic!("unpublish failed");
        };
        assert_eq!(deleted, Unpublished::Deleted(first.id));

        let Ok(Unpublished::Archived(archived)) = service
            .unpublish(PostRef::Slug(second.slug.clone()), UnpublishMode::Archive)
            .await
        else {
            panic!("archive failed");
        };
        assert_eq!(archived.status, PostStatus::Archived);

        let Ok(published) = service.list_published().await else {
            panic!("list failed");
        };
        assert!(published.is_empty());
        assert!(matches!(
            service
                .unpublish(PostRef::Id(first.id), UnpublishMode::Delete)
                .await,
            Err(GatewayError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn generate_validates_count() {
        let service = make_service();
        let prompt = |count| DraftPrompt {
            topic: "pop-up dinners".to_string(),
            keywords: Vec::new(),
            count,
        };
        assert!(matches!(
            service.generate(prompt(0)).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            service.generate(prompt(6)).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        let Ok(drafts) = service.generate(prompt(5)).await else {
            panic!("generate failed");
        };
        assert_eq!(drafts.len(), 5);
    }
}
