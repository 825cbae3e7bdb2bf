use crate::model::BookingStatus;

use super::EngineError;

/// Parse a caller-supplied status name.
pub fn parse_status(raw: &str) -> Result<BookingStatus, EngineError> {
    raw.parse::<BookingStatus>().map_err(EngineError::from)
}

/// The booking state machine:
///
/// ```text
/// Confirmed ──► CheckedIn ──► CheckedOut
///     │              │             ▲
///     │              └─────────────┤
///     └────────────────────────────┘
///   any ──► Cancelled
/// ```
pub fn transition(from: BookingStatus, to: BookingStatus) -> Result<BookingStatus, EngineError> {
    use BookingStatus::*;
    match (from, to) {
        (_, Cancelled) | (Confirmed, CheckedIn) | (Confirmed | CheckedIn, CheckedOut) => Ok(to),
        _ => Err(EngineError::InvalidTransition { from, to }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BookingStatus::*;

    const ALL: [BookingStatus; 4] = [Confirmed, CheckedIn, CheckedOut, Cancelled];

    #[test]
    fn allowed_edges() {
        assert_eq!(transition(Confirmed, CheckedIn).unwrap(), CheckedIn);
        assert_eq!(transition(Confirmed, CheckedOut).unwrap(), CheckedOut);
        assert_eq!(transition(CheckedIn, CheckedOut).unwrap(), CheckedOut);
    }

    #[test]
    fn cancel_from_anywhere() {
        for from in ALL {
            assert_eq!(transition(from, Cancelled).unwrap(), Cancelled);
        }
    }

    #[test]
    fn everything_else_is_rejected() {
        let allowed = [
            (Confirmed, CheckedIn),
            (Confirmed, CheckedOut),
            (CheckedIn, CheckedOut),
        ];
        for from in ALL {
            for to in ALL {
                if to == Cancelled || allowed.contains(&(from, to)) {
                    continue;
                }
                assert!(
                    matches!(transition(from, to), Err(EngineError::InvalidTransition { .. })),
                    "{from} -> {to} should be rejected"
                );
            }
        }
    }

    #[test]
    fn unknown_status_is_validation() {
        let err = parse_status("on-vacation").unwrap_err();
        assert_eq!(err.kind(), crate::engine::ErrorKind::Validation);
        assert_eq!(parse_status("checked_in").unwrap(), CheckedIn);
    }
}
