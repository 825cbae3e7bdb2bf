use chrono::{NaiveDate, Utc};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub(crate) fn validate_stay(range: &DateRange) -> Result<(), EngineError> {
    if range.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

pub(crate) fn check_not_in_past(range: &DateRange, today: NaiveDate) -> Result<(), EngineError> {
    if range.check_in() < today {
        return Err(EngineError::Validation(format!(
            "check-in {} is before today ({today})",
            range.check_in()
        )));
    }
    Ok(())
}

/// Reject if any other live booking on the room shares a night with `range`.
/// `exclude` lets a booking be moved without colliding with itself.
pub(crate) fn check_no_overlap(
    rs: &RoomState,
    range: &DateRange,
    exclude: Option<Ulid>,
) -> Result<(), EngineError> {
    if let Some(other) = rs.overlapping(range).find(|b| Some(b.id) != exclude) {
        metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
        return Err(EngineError::Conflict(other.id));
    }
    Ok(())
}
