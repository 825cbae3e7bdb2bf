mod amenities;
mod conflict;
mod error;
mod lifecycle;
mod mutations;
mod queries;
mod store;
#[cfg(test)]
mod tests;

pub use error::{EngineError, Entity, ErrorKind};
pub use lifecycle::{parse_status, transition};
pub use mutations::POINTS_PER_UNIT;
pub use queries::BookingFilter;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock, mpsc, oneshot};
use tracing::{error, warn};
use ulid::Ulid;

use crate::cache::{AVAILABILITY_PREFIX, AvailabilityCache, NoopCache};
use crate::journal::Journal;
use crate::model::*;
use crate::notify::{EventPublisher, NoopPublisher, Notification};
use crate::pricing::{LocalQuoter, RateQuoter};

use store::Store;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Most journal commands folded into one fsync.
const JOURNAL_BATCH_LIMIT: usize = 512;

// ── Group-commit journal channel ─────────────────────────

pub(super) enum JournalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Rewrite {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceRewrite {
        response: oneshot::Sender<u64>,
    },
}

/// Owns the journal file. Takes everything queued right now, buffers the
/// appends, syncs once, then answers every appender with the same result.
async fn journal_writer_loop(mut journal: Journal, mut rx: mpsc::Receiver<JournalCommand>) {
    let mut inbox = Vec::with_capacity(JOURNAL_BATCH_LIMIT);
    let mut waiting: Vec<oneshot::Sender<io::Result<()>>> = Vec::new();
    let mut failed: Option<io::Error> = None;

    while rx.recv_many(&mut inbox, JOURNAL_BATCH_LIMIT).await > 0 {
        for cmd in inbox.drain(..) {
            match cmd {
                JournalCommand::Append { event, response } => {
                    if failed.is_none()
                        && let Err(e) = journal.append(&event)
                    {
                        failed = Some(e);
                    }
                    waiting.push(response);
                }
                JournalCommand::Rewrite { events, response } => {
                    commit(&mut journal, &mut waiting, &mut failed);
                    let _ = response.send(journal.rewrite(&events));
                }
                JournalCommand::AppendsSinceRewrite { response } => {
                    let _ = response.send(journal.appends_since_rewrite());
                }
            }
        }
        commit(&mut journal, &mut waiting, &mut failed);
    }
}

fn commit(
    journal: &mut Journal,
    waiting: &mut Vec<oneshot::Sender<io::Result<()>>>,
    failed: &mut Option<io::Error>,
) {
    if waiting.is_empty() {
        return;
    }
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_BATCH_SIZE).record(waiting.len() as f64);
    let started = Instant::now();
    let synced = match failed.take() {
        Some(e) => Err(e),
        None => journal.sync(),
    };
    metrics::histogram!(crate::observability::JOURNAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    // A failed batch is cut off the file so the next batch lands right after
    // the last acknowledged frame; every caller in it is told it failed.
    if synced.is_err()
        && let Err(e) = journal.discard_unsynced()
    {
        error!("journal rollback failed: {e}");
    }
    let outcome = synced.map_err(|e| (e.kind(), e.to_string()));
    for tx in waiting.drain(..) {
        let result = match &outcome {
            Ok(()) => Ok(()),
            Err((kind, msg)) => Err(io::Error::new(*kind, msg.clone())),
        };
        let _ = tx.send(result);
    }
}

/// Pluggable outside-world dependencies.
pub struct Collaborators {
    pub quoter: Arc<dyn RateQuoter>,
    pub cache: Arc<dyn AvailabilityCache>,
    pub events: Arc<dyn EventPublisher>,
}

impl Collaborators {
    /// In-process pricing, no cache, no event delivery.
    pub fn local() -> Self {
        Self {
            quoter: Arc::new(LocalQuoter),
            cache: Arc::new(NoopCache),
            events: Arc::new(NoopPublisher),
        }
    }
}

pub struct Engine {
    pub(super) store: Store,
    journal_tx: mpsc::Sender<JournalCommand>,
    /// Mutations hold it shared for their whole critical section; compaction
    /// takes it exclusively so its snapshot can't miss an in-flight event.
    /// Lock order: gate, then room, then `amenities`.
    pub(super) gate: RwLock<()>,
    /// Serialises read-modify-write on loyalty balances and key/concierge limits.
    pub(super) amenities: Mutex<()>,
    pub(super) quoter: Arc<dyn RateQuoter>,
    pub(super) cache: Arc<dyn AvailabilityCache>,
    pub(super) events: Arc<dyn EventPublisher>,
}

impl Engine {
    /// Replay the journal at `path` and start the writer task. Must run
    /// inside a tokio runtime.
    pub fn open(path: PathBuf, collaborators: Collaborators) -> io::Result<Self> {
        let (journal, events) = Journal::recover(&path)?;
        let (journal_tx, journal_rx) = mpsc::channel(4096);
        tokio::spawn(journal_writer_loop(journal, journal_rx));

        let store = Store::new();
        for event in &events {
            store.replay(event);
        }
        metrics::gauge!(crate::observability::ROOMS_ACTIVE).set(store.rooms.len() as f64);

        Ok(Self {
            store,
            journal_tx,
            gate: RwLock::new(()),
            amenities: Mutex::new(()),
            quoter: collaborators.quoter,
            cache: collaborators.cache,
            events: collaborators.events,
        })
    }

    async fn journal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }

    /// Journal then apply, under the room's write lock.
    pub(super) async fn persist_and_apply(&self, rs: &mut RoomState, event: &Event) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        self.store.apply_to_room(rs, event);
        Ok(())
    }

    /// Journal then apply for events outside any room.
    pub(super) async fn persist_global(&self, event: &Event) -> Result<(), EngineError> {
        self.journal_append(event).await?;
        self.store.apply_global(event);
        Ok(())
    }

    /// Booking id → its room's write guard.
    pub(super) async fn resolve_booking_write(
        &self,
        booking_id: &Ulid,
    ) -> Result<tokio::sync::OwnedRwLockWriteGuard<RoomState>, EngineError> {
        let room_id = self
            .store
            .room_for_booking(booking_id)
            .ok_or(EngineError::NotFound(Entity::Booking, *booking_id))?;
        let rs = self
            .store
            .room(&room_id)
            .ok_or(EngineError::NotFound(Entity::Room, room_id))?;
        Ok(rs.write_owned().await)
    }

    /// Drop every cached availability answer.
    pub(super) fn availability_changed(&self) {
        let dropped = self.cache.invalidate_prefix(AVAILABILITY_PREFIX);
        if dropped > 0 {
            tracing::debug!(dropped, "availability cache invalidated");
        }
    }

    /// Evict expired availability answers. Returns how many were dropped.
    pub fn sweep_cache(&self) -> usize {
        self.cache.purge_expired()
    }

    /// Fire-and-forget delivery; failures are logged and counted only.
    pub(super) async fn publish(&self, notification: Notification) {
        if let Err(e) = self.events.publish(&notification).await {
            metrics::counter!(crate::observability::PUBLISH_FAILURES_TOTAL, "topic" => notification.topic())
                .increment(1);
            warn!(topic = notification.topic(), "event publish failed: {e}");
        }
    }

    pub(super) async fn appends_since_rewrite(&self) -> Result<u64, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::AppendsSinceRewrite { response: tx })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))
    }

    pub(super) async fn rewrite_journal(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.journal_tx
            .send(JournalCommand::Rewrite { events, response: tx })
            .await
            .map_err(|_| EngineError::JournalError("journal writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::JournalError("journal writer dropped response".into()))?
            .map_err(|e| EngineError::JournalError(e.to_string()))
    }
}
