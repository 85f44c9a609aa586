use uuid::Uuid;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

/// Reject spans outside the representable calendar or wider than any
/// plausible stay. Inverted spans are a validation error, not a silent
/// pass-through.
pub(crate) fn validate_span(span: &Span) -> Result<(), EngineError> {
    if span.start >= span.end {
        return Err(EngineError::InvalidRange);
    }
    if span.start < MIN_VALID_TIMESTAMP_MS || span.end > MAX_VALID_TIMESTAMP_MS {
        return Err(EngineError::LimitExceeded("timestamp out of range"));
    }
    if span.duration_ms() > MAX_SPAN_DURATION_MS {
        return Err(EngineError::LimitExceeded("span too wide"));
    }
    Ok(())
}

/// The no-double-booking exclusion check. Caller holds the room's write
/// lock, so a passing check stays valid until the booking is applied.
/// `exclude` skips one booking id — a reservation being rescheduled must
/// not conflict with itself.
pub(crate) fn check_no_conflict(
    rs: &RoomState,
    span: &Span,
    exclude: Option<Uuid>,
) -> Result<(), EngineError> {
    for booking in rs.overlapping(span) {
        if exclude == Some(booking.id) {
            continue;
        }
        return Err(EngineError::Conflict(booking.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(spans: &[(Ms, Ms)]) -> (RoomState, Vec<Uuid>) {
        let room = Room {
            id: Uuid::new_v4(),
            number: "101".into(),
            category_id: Uuid::new_v4(),
            is_available: true,
            location: String::new(),
        };
        let mut rs = RoomState::new(room);
        let mut ids = Vec::new();
        for &(start, end) in spans {
            let id = Uuid::new_v4();
            rs.insert_booking(Booking {
                id,
                client_id: Uuid::new_v4(),
                span: Span::new(start, end),
            });
            ids.push(id);
        }
        (rs, ids)
    }

    #[test]
    fn inverted_span_rejected() {
        assert!(matches!(
            validate_span(&Span { start: 200, end: 100 }),
            Err(EngineError::InvalidRange)
        ));
        assert!(matches!(
            validate_span(&Span { start: 100, end: 100 }),
            Err(EngineError::InvalidRange)
        ));
        assert!(validate_span(&Span::new(100, 200)).is_ok());
    }

    #[test]
    fn out_of_range_span_rejected() {
        assert!(matches!(
            validate_span(&Span { start: -5, end: 100 }),
            Err(EngineError::LimitExceeded(_))
        ));
        assert!(matches!(
            validate_span(&Span::new(0, MAX_VALID_TIMESTAMP_MS + 1)),
            Err(EngineError::LimitExceeded(_))
        ));
    }

    #[test]
    fn conflict_detected_inclusively() {
        let (rs, ids) = schedule(&[(100, 200)]);
        // Touching endpoints conflict
        let err = check_no_conflict(&rs, &Span::new(200, 300), None).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(id) if id == ids[0]));
        assert!(check_no_conflict(&rs, &Span::new(201, 300), None).is_ok());
        assert!(check_no_conflict(&rs, &Span::new(0, 99), None).is_ok());
    }

    #[test]
    fn self_exclusion_for_reschedule() {
        let (rs, ids) = schedule(&[(100, 200)]);
        // Moving the same booking within its own window is allowed
        assert!(check_no_conflict(&rs, &Span::new(150, 250), Some(ids[0])).is_ok());
        // But not onto a different booking
        let (rs2, ids2) = schedule(&[(100, 200), (300, 400)]);
        let err = check_no_conflict(&rs2, &Span::new(150, 350), Some(ids2[0])).unwrap_err();
        assert!(matches!(err, EngineError::Conflict(id) if id == ids2[1]));
    }
}
