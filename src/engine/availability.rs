use std::collections::HashSet;

use uuid::Uuid;

use crate::model::*;

// ── Availability Algorithm ────────────────────────────────────────

/// A room and the reserved spans that matter for one query window.
/// Snapshots are taken under each room's read lock; the resolver itself
/// is a pure function over them.
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room: Room,
    pub booked: Vec<Span>,
}

/// Resolve which rooms are free for the query window.
///
/// A room conflicts when any of its reservations overlaps the window,
/// inclusive at both endpoints: a stay ending on the query's first day
/// (or starting on its last) still blocks the room.
///
/// Candidates are rooms whose availability flag is set — applied whether
/// or not a category filter is present — restricted to `category` when
/// one is given. The result is sorted by room number so identical queries
/// against identical state return identical output.
pub fn available_rooms(
    snapshot: &[RoomSnapshot],
    query: &Span,
    category: Option<Uuid>,
) -> Vec<Room> {
    let conflicting: HashSet<Uuid> = snapshot
        .iter()
        .filter(|s| s.booked.iter().any(|b| b.overlaps(query)))
        .map(|s| s.room.id)
        .collect();

    let mut free: Vec<Room> = snapshot
        .iter()
        .filter(|s| s.room.is_available)
        .filter(|s| category.is_none_or(|c| s.room.category_id == c))
        .filter(|s| !conflicting.contains(&s.room.id))
        .map(|s| s.room.clone())
        .collect();

    free.sort_by(|a, b| a.number.cmp(&b.number));
    free
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const DAY: Ms = 24 * 3_600_000;

    fn room(number: &str, category_id: Uuid, is_available: bool) -> Room {
        Room {
            id: Uuid::new_v4(),
            number: number.into(),
            category_id,
            is_available,
            location: "main building".into(),
        }
    }

    fn snap(room: Room, booked: Vec<Span>) -> RoomSnapshot {
        RoomSnapshot { room, booked }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn overlapping_reservation_excludes_room() {
        let cat = Uuid::new_v4();
        let r = room("101", cat, true);
        let free = available_rooms(
            &[snap(r, vec![Span::new(2 * DAY, 5 * DAY)])],
            &Span::new(4 * DAY, 6 * DAY),
            None,
        );
        assert!(free.is_empty());
    }

    #[test]
    fn unreserved_room_included() {
        let cat = Uuid::new_v4();
        let r = room("101", cat, true);
        let free = available_rooms(
            &[snap(r.clone(), vec![Span::new(0, DAY)])],
            &Span::new(3 * DAY, 4 * DAY),
            None,
        );
        assert_eq!(free, vec![r]);
    }

    #[test]
    fn shared_endpoint_is_a_conflict() {
        // Reservation over days 1–7, query days 7–10: the shared day blocks.
        let cat = Uuid::new_v4();
        let r = room("7", cat, true);
        let reservation = Span::new(DAY, 7 * DAY);
        let free = available_rooms(
            &[snap(r.clone(), vec![reservation])],
            &Span::new(7 * DAY, 10 * DAY),
            None,
        );
        assert!(free.is_empty());
        // One millisecond later the room frees up
        let free = available_rooms(
            &[snap(r, vec![reservation])],
            &Span::new(7 * DAY + 1, 10 * DAY),
            None,
        );
        assert_eq!(free.len(), 1);
    }

    #[test]
    fn calendar_boundary_cases() {
        // Reservation 2024-03-01 12:00 → 2024-03-08 11:00; query
        // 2024-04-02 → 2024-04-03 is a disjoint range → available.
        let cat = Uuid::new_v4();
        let r = room("101", cat, true);
        let reservation = Span::new(
            parse_instant("2024-03-01 12:00:00").unwrap(),
            parse_instant("2024-03-08 11:00:00").unwrap(),
        );
        let query = day_span(date(2024, 4, 2), date(2024, 4, 3)).unwrap();
        let free = available_rooms(&[snap(r.clone(), vec![reservation])], &query, None);
        assert_eq!(free.len(), 1);

        // Reservation 2024-04-01 12:00 → 2024-04-05 11:00; query
        // 2024-04-01 → 2024-04-05 overlaps → excluded.
        let reservation = Span::new(
            parse_instant("2024-04-01 12:00:00").unwrap(),
            parse_instant("2024-04-05 11:00:00").unwrap(),
        );
        let query = day_span(date(2024, 4, 1), date(2024, 4, 5)).unwrap();
        let free = available_rooms(&[snap(r, vec![reservation])], &query, None);
        assert!(free.is_empty());
    }

    #[test]
    fn category_filter_restricts_candidates() {
        let standard = Uuid::new_v4();
        let deluxe = Uuid::new_v4();
        let r1 = room("101", standard, true);
        let r2 = room("201", deluxe, true);
        let snapshot = vec![snap(r1.clone(), vec![]), snap(r2.clone(), vec![])];

        let free = available_rooms(&snapshot, &Span::new(0, DAY), Some(standard));
        assert_eq!(free, vec![r1.clone()]);

        let free = available_rooms(&snapshot, &Span::new(0, DAY), None);
        assert_eq!(free, vec![r1, r2]);
    }

    #[test]
    fn unavailable_flag_always_applied() {
        // Flag filters candidates with and without a category filter.
        let cat = Uuid::new_v4();
        let closed = room("101", cat, false);
        let open = room("102", cat, true);
        let snapshot = vec![snap(closed, vec![]), snap(open.clone(), vec![])];

        let free = available_rooms(&snapshot, &Span::new(0, DAY), None);
        assert_eq!(free, vec![open.clone()]);
        let free = available_rooms(&snapshot, &Span::new(0, DAY), Some(cat));
        assert_eq!(free, vec![open]);
    }

    #[test]
    fn result_sorted_by_room_number() {
        let cat = Uuid::new_v4();
        let snapshot = vec![
            snap(room("305", cat, true), vec![]),
            snap(room("101", cat, true), vec![]),
            snap(room("204", cat, true), vec![]),
        ];
        let free = available_rooms(&snapshot, &Span::new(0, DAY), None);
        let numbers: Vec<_> = free.iter().map(|r| r.number.as_str()).collect();
        assert_eq!(numbers, vec!["101", "204", "305"]);
    }

    #[test]
    fn idempotent_over_unchanged_snapshot() {
        let cat = Uuid::new_v4();
        let snapshot = vec![
            snap(room("101", cat, true), vec![Span::new(0, DAY)]),
            snap(room("102", cat, true), vec![]),
        ];
        let query = Span::new(DAY / 2, 2 * DAY);
        let first = available_rooms(&snapshot, &query, None);
        let second = available_rooms(&snapshot, &query, None);
        assert_eq!(first, second);
    }

    #[test]
    fn only_own_reservations_block() {
        let cat = Uuid::new_v4();
        let busy = room("101", cat, true);
        let idle = room("102", cat, true);
        let snapshot = vec![
            snap(busy, vec![Span::new(0, 3 * DAY)]),
            snap(idle.clone(), vec![]),
        ];
        let free = available_rooms(&snapshot, &Span::new(DAY, 2 * DAY), None);
        assert_eq!(free, vec![idle]);
    }
}
