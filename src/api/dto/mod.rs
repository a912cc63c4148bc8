//! Data Transfer Objects for REST request/response serialization.
//!
//! Every successful response body carries `"success": true`; errors use
//! [`crate::error::ErrorResponse`].

pub mod blog_dto;
pub mod common_dto;
pub mod event_dto;
pub mod reservation_dto;
pub mod ticket_dto;

pub use blog_dto::*;
pub use common_dto::*;
pub use event_dto::*;
pub use reservation_dto::*;
pub use ticket_dto::*;
