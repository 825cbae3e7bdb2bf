use ulid::Ulid;

use crate::model::{BookingStatus, DateRangeError, MoneyError, UnknownVariant};
use crate::pricing::{PricingError, QuoteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Guest,
    Room,
    Booking,
    Service,
    Reservation,
    Key,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Guest => "guest",
            Entity::Room => "room",
            Entity::Booking => "booking",
            Entity::Service => "concierge service",
            Entity::Reservation => "concierge reservation",
            Entity::Key => "digital key",
        })
    }
}

/// Coarse category callers branch on (HTTP status, retry decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Internal,
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Entity, Ulid),
    AlreadyExists(String),
    /// Overlaps the given booking.
    Conflict(Ulid),
    /// Concierge service exists but isn't taking reservations.
    Unavailable(Ulid),
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    Validation(String),
    LimitExceeded(&'static str),
    PricingError(String),
    JournalError(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(..) => ErrorKind::NotFound,
            EngineError::AlreadyExists(_) | EngineError::Conflict(_) | EngineError::Unavailable(_) => {
                ErrorKind::Conflict
            }
            EngineError::InvalidTransition { .. }
            | EngineError::Validation(_)
            | EngineError::LimitExceeded(_) => ErrorKind::Validation,
            EngineError::PricingError(_) | EngineError::JournalError(_) => ErrorKind::Internal,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(entity, id) => write!(f, "{entity} not found: {id}"),
            EngineError::AlreadyExists(what) => write!(f, "already exists: {what}"),
            EngineError::Conflict(id) => write!(f, "dates overlap booking {id}"),
            EngineError::Unavailable(id) => write!(f, "concierge service {id} is unavailable"),
            EngineError::InvalidTransition { from, to } => {
                write!(f, "cannot move booking from {from} to {to}")
            }
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::PricingError(e) => write!(f, "pricing error: {e}"),
            EngineError::JournalError(e) => write!(f, "journal error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<DateRangeError> for EngineError {
    fn from(e: DateRangeError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<MoneyError> for EngineError {
    fn from(e: MoneyError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<UnknownVariant> for EngineError {
    fn from(e: UnknownVariant) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<PricingError> for EngineError {
    fn from(e: PricingError) -> Self {
        EngineError::Validation(e.to_string())
    }
}

impl From<QuoteError> for EngineError {
    fn from(e: QuoteError) -> Self {
        match e {
            QuoteError::Pricing(p) => p.into(),
            other => EngineError::PricingError(other.to_string()),
        }
    }
}
