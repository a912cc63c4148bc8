//! Persistence layer: PostgreSQL-backed stores.
//!
//! [`postgres::PostgresStore`] implements the reservation, blog and
//! counter store traits over `sqlx::PgPool`. Schema lives in
//! `migrations/` and is applied at startup.

pub mod models;
pub mod postgres;

pub use postgres::PostgresStore;
