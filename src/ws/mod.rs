//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` pushes store changefeed events to
//! clients that subscribe by event id. Connections opened with the admin
//! bearer token may also follow user ids or the `"*"` wildcard and receive
//! per-user reservation events.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
