//! PostgreSQL implementation of the store traits.
//!
//! Every query goes straight to the primary, so the list index is
//! consistent and the changefeed fires right after each write commits.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::models::{CounterRow, DraftRow, EventRow, PostRow, ReservationRow};
use crate::domain::{
    BlogDraft, BlogPost, BlogStore, CounterStore, DraftId, Event, EventBus, EventId,
    NewReservation, PostId, PostStatus, Reservation, ReservationId, ReservationStatus,
    ReservationStore, StoreEvent, UserId, WindowCount,
};
use crate::error::GatewayError;

const RESERVATION_COLUMNS: &str = "id, user_id, event_id, status, reserved_at, cancelled_at, \
     attendee_count, payment_method, payment_intent_id, total_amount, subscription_id, \
     ticket_token_hash";

const EVENT_COLUMNS: &str = "id, host_id, host_name, title, starts_at, capacity, attendee_count, \
     pricing_type, fee_amount, currency, created_at, updated_at";

const DRAFT_COLUMNS: &str = "id, title, slug, excerpt, content, tags, created_at, updated_at";

const POST_COLUMNS: &str =
    "id, source_draft_id, title, slug, excerpt, content, tags, status, published_at, updated_at";

fn db_error(e: sqlx::Error) -> GatewayError {
    if let sqlx::Error::Database(db) = &e
        && db.is_unique_violation()
    {
        return GatewayError::Conflict(db.message().to_string());
    }
    GatewayError::PersistenceError(e.to_string())
}

fn to_i32(value: u32) -> Result<i32, GatewayError> {
    i32::try_from(value)
        .map_err(|_| GatewayError::InvalidRequest(format!("value {value} is out of range")))
}

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    changefeed: EventBus,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    #[must_use]
    pub fn new(pool: PgPool, changefeed: EventBus) -> Self {
        Self { pool, changefeed }
    }

    /// Opens a connection pool to `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if no connection can be
    /// established within `connect_timeout`.
    pub async fn connect(
        url: &str,
        max_connections: u32,
        connect_timeout: Duration,
        changefeed: EventBus,
    ) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(url)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;
        Ok(Self::new(pool, changefeed))
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    fn announce(&self, event: StoreEvent) {
        self.changefeed.publish(event);
    }
}

#[async_trait]
impl ReservationStore for PostgresStore {
    async fn create_reservation(
        &self,
        new: NewReservation,
    ) -> Result<Reservation, GatewayError> {
        let payment = new.payment.unwrap_or_default();
        let row = sqlx::query_as::<_, ReservationRow>(&format!(
            "INSERT INTO reservations (id, user_id, event_id, status, reserved_at, \
             attendee_count, payment_method, payment_intent_id, total_amount, subscription_id, \
             ticket_token_hash) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {RESERVATION_COLUMNS}"
        ))
        .bind(Uuid::from(ReservationId::new()))
        .bind(new.user_id.as_str())
        .bind(Uuid::from(new.event_id))
        .bind(ReservationStatus::Reserved.as_str())
        .bind(Utc::now())
        .bind(to_i32(new.attendee_count)?)
        .bind(payment.payment_method)
        .bind(payment.payment_intent_id)
        .bind(payment.total_amount)
        .bind(payment.subscription_id)
        .bind(new.ticket_token_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        let reservation = Reservation::try_from(row)?;

        self.announce(StoreEvent::ReservationCreated {
            reservation_id: reservation.id,
            user_id: reservation.user_id.clone(),
            event_id: reservation.event_id,
            attendee_count: reservation.attendee_count,
            timestamp: reservation.reserved_at,
        });
        Ok(reservation)
    }

    async fn cancel_active_reservation(
        &self,
        user_id: &UserId,
        event_id: EventId,
    ) -> Result<Option<Reservation>, GatewayError> {
        let row = sqlx::query_as::<_, ReservationRow>(&cancel_active_sql())
        .bind(user_id.as_str())
        .bind(Uuid::from(event_id))
        .bind(ReservationStatus::Cancelled.as_str())
        .bind(Utc::now())
        .bind(ReservationStatus::Reserved.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let cancelled = Reservation::try_from(row)?;

        self.announce(StoreEvent::ReservationCancelled {
            reservation_id: cancelled.id,
            user_id: cancelled.user_id.clone(),
            event_id: cancelled.event_id,
            timestamp: cancelled.cancelled_at.unwrap_or_else(Utc::now),
        });
        Ok(Some(cancelled))
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, GatewayError> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Reservation::try_from)
        .transpose()
    }

    async fn list_reservations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Reservation>, GatewayError> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE user_id = $1 ORDER BY reserved_at DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    async fn list_reservations_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Reservation>, GatewayError> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations \
             WHERE event_id = $1 ORDER BY reserved_at ASC"
        ))
        .bind(Uuid::from(event_id))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(Reservation::try_from)
        .collect()
    }

    async fn find_by_ticket_hash(&self, hash: &str) -> Result<Option<Reservation>, GatewayError> {
        sqlx::query_as::<_, ReservationRow>(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE ticket_token_hash = $1"
        ))
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(Reservation::try_from)
        .transpose()
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
        sqlx::query_as::<_, EventRow>(&format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(Event::try_from)
            .transpose()
    }

    async fn put_event(&self, event: Event) -> Result<(), GatewayError> {
        let capacity = event.capacity.map(to_i32).transpose()?;
        sqlx::query(
            "INSERT INTO events (id, host_id, host_name, title, starts_at, capacity, \
             attendee_count, pricing_type, fee_amount, currency, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (id) DO UPDATE SET \
               host_id = EXCLUDED.host_id, host_name = EXCLUDED.host_name, \
               title = EXCLUDED.title, starts_at = EXCLUDED.starts_at, \
               capacity = EXCLUDED.capacity, attendee_count = EXCLUDED.attendee_count, \
               pricing_type = EXCLUDED.pricing_type, fee_amount = EXCLUDED.fee_amount, \
               currency = EXCLUDED.currency, updated_at = EXCLUDED.updated_at",
        )
        .bind(Uuid::from(event.id))
        .bind(event.host_id)
        .bind(event.host_name)
        .bind(event.title)
        .bind(event.starts_at)
        .bind(capacity)
        .bind(event.attendee_count)
        .bind(event.pricing_type.as_str())
        .bind(event.fee_amount)
        .bind(event.currency)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    fn changefeed(&self) -> &EventBus {
        &self.changefeed
    }
}

#[async_trait]
impl BlogStore for PostgresStore {
    async fn upsert_draft(&self, draft: BlogDraft) -> Result<BlogDraft, GatewayError> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            "INSERT INTO blog_drafts (id, title, slug, excerpt, content, tags, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET \
               title = EXCLUDED.title, slug = EXCLUDED.slug, excerpt = EXCLUDED.excerpt, \
               content = EXCLUDED.content, tags = EXCLUDED.tags, updated_at = EXCLUDED.updated_at \
             RETURNING {DRAFT_COLUMNS}"
        ))
        .bind(Uuid::from(draft.id))
        .bind(draft.title)
        .bind(draft.slug)
        .bind(draft.excerpt)
        .bind(draft.content)
        .bind(draft.tags)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn get_draft(&self, id: DraftId) -> Result<Option<BlogDraft>, GatewayError> {
        let row = sqlx::query_as::<_, DraftRow>(&format!(
            "SELECT {DRAFT_COLUMNS} FROM blog_drafts WHERE id = $1"
        ))
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(BlogDraft::from))
    }

    async fn delete_draft(&self, id: DraftId) -> Result<bool, GatewayError> {
        let result = sqlx::query("DELETE FROM blog_drafts WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn post_slug_exists(&self, slug: &str) -> Result<bool, GatewayError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM blog_posts WHERE slug = $1)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)
    }

    async fn insert_post(&self, post: BlogPost) -> Result<BlogPost, GatewayError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO blog_posts (id, source_draft_id, title, slug, excerpt, content, tags, \
             status, published_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::from(post.id))
        .bind(post.source_draft_id.map(Uuid::from))
        .bind(post.title)
        .bind(post.slug)
        .bind(post.excerpt)
        .bind(post.content)
        .bind(post.tags)
        .bind(post.status.as_str())
        .bind(post.published_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        BlogPost::try_from(row)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<BlogPost>, GatewayError> {
        sqlx::query_as::<_, PostRow>(&format!("SELECT {POST_COLUMNS} FROM blog_posts WHERE id = $1"))
            .bind(Uuid::from(id))
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .map(BlogPost::try_from)
            .transpose()
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, GatewayError> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts WHERE slug = $1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .map(BlogPost::try_from)
        .transpose()
    }

    async fn set_post_status(
        &self,
        id: PostId,
        status: PostStatus,
    ) -> Result<BlogPost, GatewayError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE blog_posts SET status = $2, updated_at = $3 WHERE id = $1 \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(Uuid::from(id))
        .bind(status.as_str())
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?
        .ok_or_else(|| GatewayError::NotFound(format!("post {id}")))?;
        BlogPost::try_from(row)
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, GatewayError> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(Uuid::from(id))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<BlogPost>, GatewayError> {
        sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM blog_posts \
             WHERE $1::TEXT IS NULL OR status = $1 \
             ORDER BY published_at DESC"
        ))
        .bind(status.map(PostStatus::as_str))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?
        .into_iter()
        .map(BlogPost::try_from)
        .collect()
    }
}

#[async_trait]
impl CounterStore for PostgresStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, GatewayError> {
        let row = sqlx::query_as::<_, CounterRow>(
            "INSERT INTO rate_limit_counters (key, count, window_ends_at) \
             VALUES ($1, 1, now() + make_interval(secs => $2)) \
             ON CONFLICT (key) DO UPDATE SET \
               count = CASE WHEN rate_limit_counters.window_ends_at <= now() THEN 1 \
                            ELSE rate_limit_counters.count + 1 END, \
               window_ends_at = CASE WHEN rate_limit_counters.window_ends_at <= now() \
                                     THEN EXCLUDED.window_ends_at \
                                     ELSE rate_limit_counters.window_ends_at END \
             RETURNING count, \
               GREATEST(EXTRACT(EPOCH FROM (window_ends_at - now())) * 1000, 0)::BIGINT \
               AS resets_in_ms",
        )
        .bind(key)
        .bind(window.as_secs_f64())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(window_count(row))
    }

    async fn current(&self, key: &str) -> Result<WindowCount, GatewayError> {
        let row = sqlx::query_as::<_, CounterRow>(
            "SELECT count, \
               GREATEST(EXTRACT(EPOCH FROM (window_ends_at - now())) * 1000, 0)::BIGINT \
               AS resets_in_ms \
             FROM rate_limit_counters WHERE key = $1 AND window_ends_at > now()",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map_or(
            WindowCount {
                count: 0,
                resets_in: Duration::ZERO,
            },
            window_count,
        ))
    }

    async fn purge_expired(&self) -> Result<u64, GatewayError> {
        let done = sqlx::query("DELETE FROM rate_limit_counters WHERE window_ends_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(done.rows_affected())
    }
}

/// Cancels the newest active reservation of a user for an event.
///
/// The outer `status` predicate is re-evaluated on the locked row, so of
/// two concurrent cancels only one updates it.
fn cancel_active_sql() -> String {
    format!(
        "UPDATE reservations SET status = $3, cancelled_at = $4 \
         WHERE id = (SELECT id FROM reservations \
                     WHERE user_id = $1 AND event_id = $2 AND status = $5 \
                     ORDER BY reserved_at DESC LIMIT 1) \
           AND status = $5 \
         RETURNING {RESERVATION_COLUMNS}"
    )
}

fn window_count(row: CounterRow) -> WindowCount {
    WindowCount {
        count: u32::try_from(row.count).unwrap_or(0),
        resets_in: Duration::from_millis(u64::try_from(row.resets_in_ms).unwrap_or(0)),
    }
}
