use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::Booking;

const CHANNEL_CAPACITY: usize = 256;

/// Outbound booking notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    BookingCreated {
        booking: Booking,
    },
    BookingCancelled {
        booking_id: Ulid,
        room_id: Ulid,
        guest_id: Ulid,
    },
}

impl Notification {
    pub fn topic(&self) -> &'static str {
        match self {
            Notification::BookingCreated { .. } => "booking-created",
            Notification::BookingCancelled { .. } => "booking-cancelled",
        }
    }
}

#[derive(Debug)]
pub struct PublishError(pub String);

impl std::fmt::Display for PublishError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "publish failed: {}", self.0)
    }
}

impl std::error::Error for PublishError {}

/// Best-effort delivery; callers log failures and move on.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), PublishError>;
}

/// Events disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _notification: &Notification) -> Result<(), PublishError> {
        Ok(())
    }
}

/// In-process fan-out to any number of subscribers.
pub struct BroadcastPublisher {
    sender: broadcast::Sender<Notification>,
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadcastPublisher {
    pub fn new() -> Self {
        Self {
            sender: broadcast::channel(CHANNEL_CAPACITY).0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, notification: &Notification) -> Result<(), PublishError> {
        // No receivers is not a failure.
        let _ = self.sender.send(notification.clone());
        Ok(())
    }
}

/// Logs each delivered notification until every publisher is gone.
/// Returns how many were seen.
pub async fn log_notifications(mut rx: broadcast::Receiver<Notification>) -> u64 {
    let mut seen = 0;
    loop {
        match rx.recv().await {
            Ok(note) => {
                seen += 1;
                match &note {
                    Notification::BookingCreated { booking } => {
                        info!(topic = note.topic(), booking = %booking.id, room = %booking.room_id, "event");
                    }
                    Notification::BookingCancelled { booking_id, room_id, .. } => {
                        info!(topic = note.topic(), booking = %booking_id, room = %room_id, "event");
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "event log subscriber fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => return seen,
        }
    }
}
