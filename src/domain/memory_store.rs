//! In-process document store with an eventually consistent list index.
//!
//! [`MemoryStore`] implements every store trait on plain `HashMap`s behind
//! [`tokio::sync`] locks. Point reads always see the latest version of a
//! document. The per-user list index only exposes a version once
//! `read_lag` has elapsed since it was written, which reproduces the
//! read-after-write gap the confirmation poller exists for. With a zero lag
//! the store is strongly consistent.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::store::{BlogStore, CounterStore, ReservationStore, WindowCount};
use super::{
    BlogDraft, BlogPost, DraftId, Event, EventBus, EventId, NewReservation, PostId, PostStatus,
    Reservation, ReservationId, ReservationStatus, StoreEvent, UserId,
};
use crate::error::GatewayError;

/// One written version of a reservation and when the index exposes it.
#[derive(Debug, Clone)]
struct Version {
    visible_at: Instant,
    reservation: Reservation,
}

/// A reservation document with its version history, oldest first.
#[derive(Debug, Default)]
struct ReservationDoc {
    versions: Vec<Version>,
}

impl ReservationDoc {
    fn latest(&self) -> Option<&Reservation> {
        self.versions.last().map(|v| &v.reservation)
    }

    fn indexed_at(&self, now: Instant) -> Option<&Reservation> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.visible_at <= now)
            .map(|v| &v.reservation)
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started_at: Instant,
    length: Duration,
    count: u32,
}

impl Window {
    fn remaining(&self, now: Instant) -> Option<Duration> {
        let ends_at = self.started_at + self.length;
        (now < ends_at).then(|| ends_at - now)
    }
}

/// Elapsed windows are swept on write at most this often.
const COUNTER_SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CounterTable {
    windows: HashMap<String, Window>,
    swept_at: Instant,
}

impl CounterTable {
    fn sweep(&mut self, now: Instant) -> u64 {
        let before = self.windows.len();
        self.windows.retain(|_, w| w.remaining(now).is_some());
        self.swept_at = now;
        u64::try_from(before - self.windows.len()).unwrap_or(u64::MAX)
    }
}

/// In-memory implementation of [`ReservationStore`], [`BlogStore`] and
/// [`CounterStore`].
#[derive(Debug)]
pub struct MemoryStore {
    read_lag: Duration,
    changefeed: EventBus,
    reservations: RwLock<HashMap<ReservationId, ReservationDoc>>,
    events: RwLock<HashMap<EventId, Event>>,
    drafts: RwLock<HashMap<DraftId, BlogDraft>>,
    posts: RwLock<HashMap<PostId, BlogPost>>,
    counters: Mutex<CounterTable>,
    list_queries: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store whose list index lags writes by `read_lag`.
    #[must_use]
    pub fn new(read_lag: Duration, changefeed: EventBus) -> Self {
        Self {
            read_lag,
            changefeed,
            reservations: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            drafts: RwLock::new(HashMap::new()),
            posts: RwLock::new(HashMap::new()),
            counters: Mutex::new(CounterTable {
                windows: HashMap::new(),
                swept_at: Instant::now(),
            }),
            list_queries: AtomicU64::new(0),
        }
    }

    /// Creates a strongly consistent store with its own changefeed.
    #[must_use]
    pub fn consistent() -> Self {
        Self::new(Duration::ZERO, EventBus::new(1_024))
    }

    /// Number of `list_reservations_for_user` queries served so far.
    #[must_use]
    pub fn list_query_count(&self) -> u64 {
        self.list_queries.load(Ordering::Relaxed)
    }

    /// Publishes `event` once the list index exposes the write.
    fn announce(&self, event: StoreEvent) {
        self.changefeed.publish_after(event, self.read_lag);
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn create_reservation(
        &self,
        new: NewReservation,
    ) -> Result<Reservation, GatewayError> {
        let reservation = Reservation {
            id: ReservationId::new(),
            user_id: new.user_id,
            event_id: new.event_id,
            status: ReservationStatus::Reserved,
            reserved_at: Utc::now(),
            cancelled_at: None,
            attendee_count: new.attendee_count,
            payment: new.payment,
            ticket_token_hash: new.ticket_token_hash,
        };

        let version = Version {
            visible_at: Instant::now() + self.read_lag,
            reservation: reservation.clone(),
        };
        self.reservations.write().await.insert(
            reservation.id,
            ReservationDoc {
                versions: vec![version],
            },
        );

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
        let mut map = self.reservations.write().await;
        let Some(doc) = map.values_mut().find(|doc| {
            doc.latest()
                .is_some_and(|r| &r.user_id == user_id && r.is_active_for(event_id))
        }) else {
            return Ok(None);
        };
        let Some(mut cancelled) = doc.latest().cloned() else {
            return Ok(None);
        };
        cancelled.status = ReservationStatus::Cancelled;
        cancelled.cancelled_at = Some(Utc::now());
        doc.versions.push(Version {
            visible_at: Instant::now() + self.read_lag,
            reservation: cancelled.clone(),
        });
        drop(map);

        self.announce(StoreEvent::ReservationCancelled {
            reservation_id: cancelled.id,
            user_id: cancelled.user_id.clone(),
            event_id: cancelled.event_id,
            timestamp: Utc::now(),
        });
        Ok(Some(cancelled))
    }

    async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, GatewayError> {
        let map = self.reservations.read().await;
        Ok(map.get(&id).and_then(ReservationDoc::latest).cloned())
    }

    async fn list_reservations_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<Reservation>, GatewayError> {
        self.list_queries.fetch_add(1, Ordering::Relaxed);
        let now = Instant::now();
        let map = self.reservations.read().await;
        let mut rows: Vec<Reservation> = map
            .values()
            .filter_map(|doc| doc.indexed_at(now))
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
        Ok(rows)
    }

    async fn list_reservations_for_event(
        &self,
        event_id: EventId,
    ) -> Result<Vec<Reservation>, GatewayError> {
        let map = self.reservations.read().await;
        Ok(map
            .values()
            .filter_map(ReservationDoc::latest)
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn find_by_ticket_hash(&self, hash: &str) -> Result<Option<Reservation>, GatewayError> {
        let map = self.reservations.read().await;
        Ok(map
            .values()
            .filter_map(ReservationDoc::latest)
            .find(|r| r.ticket_token_hash == hash)
            .cloned())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<Event>, GatewayError> {
        Ok(self.events.read().await.get(&id).cloned())
    }

    async fn put_event(&self, event: Event) -> Result<(), GatewayError> {
        self.events.write().await.insert(event.id, event);
        Ok(())
    }

    fn changefeed(&self) -> &EventBus {
        &self.changefeed
    }
}

#[async_trait]
impl BlogStore for MemoryStore {
    async fn upsert_draft(&self, draft: BlogDraft) -> Result<BlogDraft, GatewayError> {
        self.drafts.write().await.insert(draft.id, draft.clone());
        Ok(draft)
    }

    async fn get_draft(&self, id: DraftId) -> Result<Option<BlogDraft>, GatewayError> {
        Ok(self.drafts.read().await.get(&id).cloned())
    }

    async fn delete_draft(&self, id: DraftId) -> Result<bool, GatewayError> {
        Ok(self.drafts.write().await.remove(&id).is_some())
    }

    async fn post_slug_exists(&self, slug: &str) -> Result<bool, GatewayError> {
        Ok(self.posts.read().await.values().any(|p| p.slug == slug))
    }

    async fn insert_post(&self, post: BlogPost) -> Result<BlogPost, GatewayError> {
        let mut map = self.posts.write().await;
        if map.values().any(|p| p.slug == post.slug) {
            return Err(GatewayError::Conflict(format!(
                "slug {} already in use",
                post.slug
            )));
        }
        map.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> Result<Option<BlogPost>, GatewayError> {
        Ok(self.posts.read().await.get(&id).cloned())
    }

    async fn get_post_by_slug(&self, slug: &str) -> Result<Option<BlogPost>, GatewayError> {
        Ok(self
            .posts
            .read()
            .await
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn set_post_status(
        &self,
        id: PostId,
        status: PostStatus,
    ) -> Result<BlogPost, GatewayError> {
        let mut map = self.posts.write().await;
        let post = map
            .get_mut(&id)
            .ok_or_else(|| GatewayError::NotFound(format!("post {id}")))?;
        post.status = status;
        post.updated_at = Utc::now();
        Ok(post.clone())
    }

    async fn delete_post(&self, id: PostId) -> Result<bool, GatewayError> {
        Ok(self.posts.write().await.remove(&id).is_some())
    }

    async fn list_posts(&self, status: Option<PostStatus>) -> Result<Vec<BlogPost>, GatewayError> {
        let map = self.posts.read().await;
        let mut posts: Vec<BlogPost> = map
            .values()
            .filter(|p| status.is_none_or(|s| p.status == s))
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        Ok(posts)
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, GatewayError> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        if now.duration_since(counters.swept_at) >= COUNTER_SWEEP_EVERY {
            counters.sweep(now);
        }
        let slot = counters.windows.entry(key.to_string()).or_insert(Window {
            started_at: now,
            length: window,
            count: 0,
        });
        if slot.remaining(now).is_none() {
            *slot = Window {
                started_at: now,
                length: window,
                count: 0,
            };
        }
        slot.count = slot.count.saturating_add(1);
        Ok(WindowCount {
            count: slot.count,
            resets_in: slot.remaining(now).unwrap_or(Duration::ZERO),
        })
    }

    async fn current(&self, key: &str) -> Result<WindowCount, GatewayError> {
        let now = Instant::now();
        let counters = self.counters.lock().await;
        let snapshot = counters
            .windows
            .get(key)
            .and_then(|w| w.remaining(now).map(|left| (w.count, left)));
        Ok(match snapshot {
            Some((count, resets_in)) => WindowCount { count, resets_in },
            None => WindowCount {
                count: 0,
                resets_in: Duration::ZERO,
            },
        })
    }

    async fn purge_expired(&self) -> Result<u64, GatewayError> {
        Ok(self.counters.lock().await.sweep(Instant::now()))
    }
}
