//! Domain layer: identifiers, documents, store interfaces and changefeed.
//!
//! This module contains the reservation, event and blog document types,
//! the store traits every service is injected with, the in-memory store
//! implementation, and the event bus carrying store change notifications.

pub mod blog;
pub mod event;
pub mod event_bus;
pub mod ids;
pub mod memory_store;
pub mod reservation;
pub mod store;
pub mod store_event;

pub use blog::{BlogDraft, BlogPost, PostStatus};
pub use event::{Event, PricingType};
pub use event_bus::{EventBus, PairWatch, Signal};
pub use ids::{DraftId, EventId, PostId, ReservationId, UserId};
pub use memory_store::MemoryStore;
pub use reservation::{NewReservation, PaymentDetails, Reservation, ReservationStatus};
pub use store::{BlogStore, CounterStore, ReservationStore, WindowCount};
pub use store_event::StoreEvent;
