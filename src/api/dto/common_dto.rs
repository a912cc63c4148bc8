//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{Event, PaymentDetails, PricingType, Reservation};

/// Payment fields of a reservation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct PaymentDto {
    /// Payment method label (e.g. `"card"`).
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Provider payment intent.
    #[serde(default)]
    pub payment_intent_id: Option<String>,
    /// Total charged in the smallest currency unit.
    #[serde(default)]
    pub total_amount: Option<i64>,
    /// Provider subscription.
    #[serde(default)]
    pub subscription_id: Option<String>,
}

impl From<PaymentDto> for PaymentDetails {
    fn from(dto: PaymentDto) -> Self {
        Self {
            payment_method: dto.payment_method,
            payment_intent_id: dto.payment_intent_id,
            total_amount: dto.total_amount,
            subscription_id: dto.subscription_id,
        }
    }
}

impl From<PaymentDetails> for PaymentDto {
    fn from(details: PaymentDetails) -> Self {
        Self {
            payment_method: details.payment_method,
            payment_intent_id: details.payment_intent_id,
            total_amount: details.total_amount,
            subscription_id: details.subscription_id,
        }
    }
}

/// A reservation as exposed over the API. The ticket token hash is never
/// included.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReservationDto {
    /// Reservation identifier.
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
    pub attendee_count: u32,
    /// Payment fields for paid events.
    pub payment: Option<PaymentDto>,
}

impl From<Reservation> for ReservationDto {
    fn from(r: Reservation) -> Self {
        Self {
            id: r.id.into(),
            user_id: r.user_id.as_str().to_string(),
            event_id: r.event_id.into(),
            status: r.status.as_str().to_string(),
            reserved_at: r.reserved_at,
            cancelled_at: r.cancelled_at,
            attendee_count: r.attendee_count,
            payment: r.payment.map(PaymentDto::from),
        }
    }
}

/// An event as exposed over the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EventDto {
    /// Event identifier.
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
    pub capacity: Option<u32>,
    /// Cached attendee count.
    pub attendee_count: i64,
    /// Seats left, when the event has a capacity.
    pub remaining_capacity: Option<i64>,
    /// `free`, `online` or `door`.
    pub pricing_type: String,
    /// Fee per attendee.
    pub fee_amount: Option<i64>,
    /// Currency code.
    pub currency: Option<String>,
}

impl From<Event> for EventDto {
    fn from(e: Event) -> Self {
        Self {
            id: e.id.into(),
            remaining_capacity: e.remaining_capacity(),
            host_id: e.host_id,
            host_name: e.host_name,
            title: e.title,
            starts_at: e.starts_at,
            capacity: e.capacity,
            attendee_count: e.attendee_count,
            pricing_type: e.pricing_type.as_str().to_string(),
            fee_amount: e.fee_amount,
            currency: e.currency,
        }
    }
}

/// Parses a pricing type string.
///
/// # Errors
///
/// Returns [`crate::error::GatewayError::InvalidRequest`] for unknown values.
pub fn parse_pricing(raw: &str) -> Result<PricingType, crate::error::GatewayError> {
    PricingType::parse(raw).ok_or_else(|| {
        crate::error::GatewayError::InvalidRequest(format!(
            "pricing_type must be free, online or door, got {raw:?}"
        ))
    })
}

