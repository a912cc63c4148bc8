//! Store interfaces injected into services.
//!
//! The document store is reached only through these traits so that
//! services never touch a process-wide singleton and tests can substitute
//! the in-memory implementation.
//!
//! # Consistency
//!
//! Point reads ([`ReservationStore::get_reservation`],
//! [`ReservationStore::find_by_ticket_hash`]) observe every completed write.
//! [`ReservationStore::list_reservations_for_user`] is served by a
//! secondary index and may lag behind writes; callers that need
//! read-your-writes must go through the confirmation poller.

use std::time::Duration;

use async_trait::async_trait;

use super::{
    BlogDraft, BlogPost, DraftId, Event, EventBus, EventId, NewReservation, PostId, PostStatus,
    Reservation, ReservationId, UserId,
};
use crate::error::GatewayError;

/// Reservation and event documents.
#[async_trait]
pub trait ReservationStore: Send + Sync + std::fmt::Debug {
    /// Creates a reservation with status `reserved` and a store-assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn create_reservation(&self, new: NewReservation)
    -> Result<Reservation, GatewayError>;

    /// Transitions the active reservation of (`user_id`, `event_id`) to
    /// `cancelled`. Returns `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn cancel_active_reservation(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> Result<Option<Reservation>, GatewayError>;

    /// Point read by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn get_reservation(&self, id: ReservationId)
    -> Result<Option<Reservation>, GatewayError>;

    /// Lists a user's reservations through the (eventually consistent) index.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the query fails.
    async fn list_reservations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Reservation>, GatewayError>;

    /// Lists every reservation held against an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the query fails.
    async fn list_reservations_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Reservation>, GatewayError>;

    /// Resolves a reservation from the SHA-256 hex digest of its ticket token.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn find_by_ticket_hash(&self, hash: &str) -> Result<Option<Reservation>, GatewayError>;

    /// Point read of an event.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn get_event(&self, id: EventId) -> Result<Option<Event>, GatewayError>;

    /// Inserts or replaces an event document.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn put_event(&self, event: Event) -> Result<(), GatewayError>;

    /// Changefeed carrying a notification for each write once it is
    /// visible to [`Self::list_reservations_for_user`].
    fn changefeed(&self) -> &EventBus;
}

/// Blog draft and post collections.
#[async_trait]
pub trait BlogStore: Send + Sync + std::fmt::Debug {
    /// Inserts or replaces a draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn upsert_draft(&self, draft: BlogDraft) -> Result<BlogDraft, GatewayError>;

    /// Point read of a draft.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn get_draft(&self, id: DraftId) -> Result<Option<BlogDraft>, GatewayError>;

    /// Deletes a draft, returning `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn delete_draft(&self, id: DraftId) -> Result<bool, GatewayError>;

    /// Returns `true` if any post (published or archived) uses `slug`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn post_slug_exists(&self, slug: &str) -> Result<bool, GatewayError>;

    /// Inserts a new post.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Conflict`] if the slug was taken in the
    /// meantime, or [`GatewayError::PersistenceError`] if the write fails.
    async fn insert_post(&self, post: BlogPost) -> Result<BlogPost, GatewayError>;

    /// Point read of a post by id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn get_post(&self, id: PostId) -> Result<Option<BlogPost>, GatewayError>;

    /// Point read of a post by slug.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the read fails.
    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, GatewayError>;

    /// Changes the visibility of a post.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotFound`] if the post does not exist, or
    /// [`GatewayError::PersistenceError`] if the write fails.
    async fn set_post_status(&self, id: PostId, status: PostStatus)
    -> Result<BlogPost, GatewayError>;

    /// Deletes a post, returning `true` if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the write fails.
    async fn delete_post(&self, id: PostId) -> Result<bool, GatewayError>;

    /// Lists posts, newest first, optionally filtered by status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the query fails.
    async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<BlogPost>, GatewayError>;
}

/// Snapshot of a fixed-window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Number of hits recorded in the current window.
    pub count: u32,
    /// Time until the current window ends.
    pub resets_in: Duration,
}

/// Keyed fixed-window counters with expiry.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    /// Records one hit for `key`. If the key has no window or its window
    /// has elapsed, a new window of length `window` starts with count 1.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the counter backend fails.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, GatewayError>;

    /// Reads the count of the current window without recording a hit.
    /// An absent or elapsed window reads as zero.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the counter backend fails.
    async fn current(&self, key: &str) -> Result<WindowCount, GatewayError>;

    /// Drops every elapsed window and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] if the counter backend fails.
    async fn purge_expired(&self) -> Result<u64, GatewayError>;
}
