//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered changefeed events.
//!
//! Public connections may only follow events, and only receive changes
//! that carry no user id. Following users or the `"*"` wildcard needs the
//! admin token.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType};
use super::subscription::SubscriptionManager;
use crate::domain::{EventId, StoreEvent, UserId};

const WILDCARD: &str = "*";

/// What a connection is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsAccess {
    /// Anonymous client.
    Public,
    /// Client that presented the admin token.
    Admin,
}

impl WsAccess {
    /// Returns `true` if `event` may be pushed to this connection.
    #[must_use]
    pub fn can_see(self, event: &StoreEvent) -> bool {
        self == Self::Admin || event.user_id().is_none()
    }
}

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<StoreEvent>,
    access: WsAccess,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let response = handle_text_message(&text, &mut subs, access);
                        if let Some(resp_json) = response
                            && ws_tx.send(Message::text(resp_json)).await.is_err() {
                                break;
                            }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(store_event) => {
                        if !access.can_see(&store_event) || !subs.matches(&store_event) {
                            continue;
                        }
                        let Some(json) = render_event(&store_event) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind changefeed");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

fn render_event(event: &StoreEvent) -> Option<String> {
    let payload = serde_json::to_value(event).ok()?;
    let msg = WsMessage::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload);
    serde_json::to_string(&msg).ok()
}

/// Handles a text message from the client, returning an optional JSON response.
fn handle_text_message(
    text: &str,
    subs: &mut SubscriptionManager,
    access: WsAccess,
) -> Option<String> {
    let Ok(msg) = serde_json::from_str::<WsMessage>(text) else {
        return serde_json::to_string(&WsMessage::error("", 400, "malformed JSON")).ok();
    };
    if msg.msg_type != WsMessageType::Command {
        return serde_json::to_string(&WsMessage::error(msg.id, 400, "expected a command")).ok();
    }
    let Ok(command) = serde_json::from_value::<WsCommand>(msg.payload) else {
        return serde_json::to_string(&WsMessage::error(msg.id, 404, "unknown command")).ok();
    };

    let payload = match command {
        WsCommand::Subscribe {
            user_ids,
            event_ids,
        } => {
            let filter = Filter::parse(&user_ids, &event_ids);
            if access == WsAccess::Public && (filter.wildcard || !filter.users.is_empty()) {
                return serde_json::to_string(&WsMessage::error(
                    msg.id,
                    403,
                    "user and wildcard subscriptions require the admin token",
                ))
                .ok();
            }
            subs.subscribe(&filter.users, &filter.events, filter.wildcard);
            serde_json::json!({
                "subscribed": filter.rendered(),
                "count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::Unsubscribe {
            user_ids,
            event_ids,
        } => {
            let filter = Filter::parse(&user_ids, &event_ids);
            subs.unsubscribe(&filter.users, &filter.events, filter.wildcard);
            serde_json::json!({
                "unsubscribed": filter.rendered(),
                "remaining_count": subs.count(),
                "wildcard": subs.is_subscribed_all(),
            })
        }
        WsCommand::Ping => serde_json::json!({ "pong": true }),
    };

    serde_json::to_string(&WsMessage::new(msg.id, WsMessageType::Response, payload)).ok()
}

/// Parsed id lists of a subscribe or unsubscribe command. Event ids that
/// are not UUIDs are skipped.
struct Filter {
    users: Vec<UserId>,
    events: Vec<EventId>,
    wildcard: bool,
}

impl Filter {
    fn parse(user_ids: &[String], event_ids: &[String]) -> Self {
        let mut wildcard = false;
        let mut users = Vec::new();
        for raw in user_ids {
            if raw == WILDCARD {
                wildcard = true;
            } else if !raw.trim().is_empty() {
                users.push(UserId::new(raw.trim()));
            }
        }
        let mut events = Vec::new();
        for raw in event_ids {
            if raw == WILDCARD {
                wildcard = true;
            } else if let Ok(uuid) = raw.parse::<uuid::Uuid>() {
                events.push(EventId::from_uuid(uuid));
            }
        }
        Self {
            users,
            events,
            wildcard,
        }
    }

    fn rendered(&self) -> serde_json::Value {
        serde_json::json!({
            "user_ids": self.users.iter().map(UserId::as_str).collect::<Vec<_>>(),
            "event_ids": self.events.iter().map(ToString::to_string).collect::<Vec<_>>(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::ReservationId;

    fn command(payload: serde_json::Value) -> String {
        serde_json::json!({
            "id": "req-1",
            "type": "command",
            "timestamp": Utc::now(),
            "payload": payload,
        })
        .to_string()
    }

    fn reply(text: &str, subs: &mut SubscriptionManager) -> WsMessage {
        reply_as(text, subs, WsAccess::Admin)
    }

    fn reply_as(text: &str, subs: &mut SubscriptionManager, access: WsAccess) -> WsMessage {
        let Some(raw) = handle_text_message(text, subs, access) else {
            panic!("expected a reply");
        };
        let Ok(msg) = serde_json::from_str::<WsMessage>(&raw) else {
            panic!("reply is not an envelope: {raw}");
        };
        msg
    }

    #[test]
    fn malformed_json_yields_error() {
        let mut subs = SubscriptionManager::new();
        let msg = reply("{not json", &mut subs);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 400);
    }

    #[test]
    fn subscribe_by_event_filters_the_feed() {
        let mut subs = SubscriptionManager::new();
        let event_id = EventId::new();
        let msg = reply(
            &command(serde_json::json!({
                "command": "subscribe",
                "event_ids": [event_id.to_string(), "not-a-uuid"],
            })),
            &mut subs,
        );
        assert_eq!(msg.msg_type, WsMessageType::Response);
        assert_eq!(msg.id, "req-1");
        assert_eq!(msg.payload["count"], 1);

        let event = StoreEvent::ReservationCreated {
            reservation_id: ReservationId::new(),
            user_id: UserId::new("u1"),
            event_id,
            attendee_count: 2,
            timestamp: Utc::now(),
        };
        assert!(subs.matches(&event));
        let Some(rendered) = render_event(&event) else {
            panic!("event should render");
        };
        assert!(rendered.contains("\"event_type\":\"reservation_created\""));
    }

    #[test]
    fn wildcard_user_subscription_sets_flag() {
        let mut subs = SubscriptionManager::new();
        let msg = reply(
            &command(serde_json::json!({ "command": "subscribe", "user_ids": ["*"] })),
            &mut subs,
        );
        assert_eq!(msg.payload["wildcard"], true);
        assert!(subs.is_subscribed_all());
    }

    #[test]
    fn unsubscribe_reports_remaining() {
        let mut subs = SubscriptionManager::new();
        subs.subscribe(&[UserId::new("u1"), UserId::new("u2")], &[], false);
        let msg = reply(
            &command(serde_json::json!({ "command": "unsubscribe", "user_ids": ["u1"] })),
            &mut subs,
        );
        assert_eq!(msg.payload["remaining_count"], 1);
    }

    #[test]
    fn ping_gets_pong() {
        let mut subs = SubscriptionManager::new();
        let msg = reply(&command(serde_json::json!({ "command": "ping" })), &mut subs);
        assert_eq!(msg.payload["pong"], true);
    }

    #[test]
    fn unknown_command_is_rejected() {
        let mut subs = SubscriptionManager::new();
        let msg = reply(&command(serde_json::json!({ "command": "swap" })), &mut subs);
        assert_eq!(msg.msg_type, WsMessageType::Error);
        assert_eq!(msg.payload["code"], 404);
    }

    #[test]
    fn public_clients_cannot_follow_users_or_everything() {
        for user_ids in [serde_json::json!(["u1"]), serde_json::json!(["*"])] {
            let mut subs = SubscriptionManager::new();
            let msg = reply_as(
                &command(serde_json::json!({ "command": "subscribe", "user_ids": user_ids })),
                &mut subs,
                WsAccess::Public,
            );
            assert_eq!(msg.msg_type, WsMessageType::Error);
            assert_eq!(msg.payload["code"], 403);
            assert_eq!(subs.count(), 0);
            assert!(!subs.is_subscribed_all());
        }
    }

    #[test]
    fn public_event_followers_only_see_counts() {
        let mut subs = SubscriptionManager::new();
        let event_id = EventId::new();
        let msg = reply_as(
            &command(serde_json::json!({
                "command": "subscribe",
                "event_ids": [event_id.to_string()],
            })),
            &mut subs,
            WsAccess::Public,
        );
        assert_eq!(msg.msg_type, WsMessageType::Response);

        let created = StoreEvent::ReservationCreated {
            reservation_id: ReservationId::new(),
            user_id: UserId::new("u1"),
            event_id,
            attendee_count: 1,
            timestamp: Utc::now(),
        };
        let counted = StoreEvent::AttendeeCountChanged {
            event_id,
            attendee_count: 1,
            timestamp: Utc::now(),
        };
        assert!(subs.matches(&created));
        assert!(!WsAccess::Public.can_see(&created));
        assert!(WsAccess::Admin.can_see(&created));
        assert!(WsAccess::Public.can_see(&counted));
    }
}
