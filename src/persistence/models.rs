//! Database rows and their conversion into domain documents.
//!
//! Postgres has no unsigned integers, so counts are stored as `INTEGER`
//! and range-checked on the way out.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::domain::{
    BlogDraft, BlogPost, DraftId, Event, EventId, PaymentDetails, PostId, PostStatus, PricingType,
    Reservation, ReservationId, ReservationStatus, UserId,
};
use crate::error::GatewayError;

fn corrupt(table: &str, column: &str, value: impl std::fmt::Display) -> GatewayError {
    GatewayError::PersistenceError(format!("{table}.{column} holds invalid value {value}"))
}

fn to_u32(table: &str, column: &str, value: i32) -> Result<u32, GatewayError> {
    u32::try_from(value).map_err(|_| corrupt(table, column, value))
}

/// A row of the `reservations` table.
#[derive(Debug, Clone, FromRow)]
pub struct ReservationRow {
    /// Primary key.
    pub id: Uuid,
    /// Owner.
    pub user_id: String,
    /// Reserved event.
    pub event_id: Uuid,
    /// `reserved` or `cancelled`.
    pub status: String,
    /// Creation timestamp.
    pub reserved_at: DateTime<Utc>,
    /// Cancellation timestamp.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Seats claimed.
    pub attendee_count: i32,
    /// Payment method label.
    pub payment_method: Option<String>,
    /// Provider payment intent.
    pub payment_intent_id: Option<String>,
    /// Total charged.
    pub total_amount: Option<i64>,
    /// Provider subscription.
    pub subscription_id: Option<String>,
    /// SHA-256 hex digest of the ticket token.
    pub ticket_token_hash: String,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = GatewayError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = ReservationStatus::parse(&row.status)
            .ok_or_else(|| corrupt("reservations", "status", &row.status))?;
        let payment = PaymentDetails {
            payment_method: row.payment_method,
            payment_intent_id: row.payment_intent_id,
            total_amount: row.total_amount,
            subscription_id: row.subscription_id,
        };
        Ok(Self {
            id: ReservationId::from_uuid(row.id),
            user_id: UserId::new(row.user_id),
            event_id: EventId::from_uuid(row.event_id),
            status,
            reserved_at: row.reserved_at,
            cancelled_at: row.cancelled_at,
            attendee_count: to_u32("reservations", "attendee_count", row.attendee_count)?,
            payment: (!payment.is_empty()).then_some(payment),
            ticket_token_hash: row.ticket_token_hash,
        })
    }
}

/// A row of the `events` table.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    /// Primary key.
    pub id: Uuid,
    /// Host user identifier.
    pub host_id: String,
    /// Host display name.
    pub host_name: String,
    /// Title.
    pub title: String,
    /// Scheduled start.
    pub starts_at: DateTime<Utc>,
    /// Attendee limit.
    pub capacity: Option<i32>,
    /// Cached attendee count.
    pub attendee_count: i64,
    /// `free`, `online` or `door`.
    pub pricing_type: String,
    /// Fee per attendee.
    pub fee_amount: Option<i64>,
    /// Currency code.
    pub currency: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = GatewayError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let pricing_type = PricingType::parse(&row.pricing_type)
            .ok_or_else(|| corrupt("events", "pricing_type", &row.pricing_type))?;
        let capacity = row
            .capacity
            .map(|c| to_u32("events", "capacity", c))
            .transpose()?;
        Ok(Self {
            id: EventId::from_uuid(row.id),
            host_id: row.host_id,
            host_name: row.host_name,
            title: row.title,
            starts_at: row.starts_at,
            capacity,
            attendee_count: row.attendee_count,
            pricing_type,
            fee_amount: row.fee_amount,
            currency: row.currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row of the `blog_drafts` table.
#[derive(Debug, Clone, FromRow)]
pub struct DraftRow {
    /// Primary key.
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
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last upsert timestamp.
    pub updated_at: DateTime<Utc>,
}

impl From<DraftRow> for BlogDraft {
    fn from(row: DraftRow) -> Self {
        Self {
            id: DraftId::from_uuid(row.id),
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            content: row.content,
            tags: row.tags,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A row of the `blog_posts` table.
#[derive(Debug, Clone, FromRow)]
pub struct PostRow {
    /// Primary key.
    pub id: Uuid,
    /// Draft the post was promoted from.
    pub source_draft_id: Option<Uuid>,
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
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for BlogPost {
    type Error = GatewayError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let status = PostStatus::parse(&row.status)
            .ok_or_else(|| corrupt("blog_posts", "status", &row.status))?;
        Ok(Self {
            id: PostId::from_uuid(row.id),
            source_draft_id: row.source_draft_id.map(DraftId::from_uuid),
            title: row.title,
            slug: row.slug,
            excerpt: row.excerpt,
            content: row.content,
            tags: row.tags,
            status,
            published_at: row.published_at,
            updated_at: row.updated_at,
        })
    }
}

/// Current window of a rate-limit counter.
#[derive(Debug, Clone, Copy, FromRow)]
pub struct CounterRow {
    /// Hits in the window.
    pub count: i32,
    /// Milliseconds until the window ends.
    pub resets_in_ms: i64,
}
