use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unix milliseconds — the engine's only time type.
pub type Ms = i64;

/// Closed interval `[start, end]`.
///
/// Reservations conflict on shared instants at either endpoint: a stay
/// ending on the day a query starts still blocks the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn duration_ms(&self) -> Ms {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

/// Span covering whole calendar days: midnight on `start` through the last
/// millisecond of `end`, in UTC. `None` when the window is inverted.
pub fn day_span(start: NaiveDate, end: NaiveDate) -> Option<Span> {
    if start > end {
        return None;
    }
    let s = start.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis();
    let e = end
        .and_hms_milli_opt(23, 59, 59, 999)?
        .and_utc()
        .timestamp_millis();
    Some(Span::new(s, e))
}

/// Parse a reservation instant: RFC 3339 or naive `YYYY-MM-DD HH:MM:SS`
/// (taken as UTC, matching the service's historical input format).
pub fn parse_instant(text: &str) -> Option<Ms> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc().timestamp_millis());
    }
    None
}

pub fn format_instant(ms: Ms) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        None => ms.to_string(),
    }
}

// ── Entities ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: Uuid,
    pub username: String,
    /// `salt:sha256(salt ‖ password)` hex. Never serialized to the API.
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
    pub department: String,
    pub hire_date: Option<NaiveDate>,
    pub date_of_termination: Option<NaiveDate>,
    pub groups: Vec<String>,
}

impl Employee {
    /// True once the termination date is in the past (relative to `today`).
    /// The recorded date itself is the employee's last working day.
    pub fn is_terminated(&self, today: NaiveDate) -> bool {
        self.date_of_termination.is_some_and(|d| d < today)
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amenity {
    pub id: Uuid,
    pub name: String,
}

/// A price/amenity tier shared by multiple rooms ("room standard").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomCategory {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    /// Minor currency units (cents) per night.
    pub price_per_night: i64,
    pub amenities: Vec<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    pub number: String,
    pub category_id: Uuid,
    pub is_available: bool,
    pub location: String,
}

/// One reserved interval on a room's schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub client_id: Uuid,
    pub span: Span,
}

/// A room plus its schedule. One write lock guards both, so the overlap
/// check and the booking insert form a single critical section.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// All bookings, sorted by `span.start`.
    pub bookings: Vec<Booking>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            bookings: Vec::new(),
        }
    }

    /// Insert a booking maintaining sort order by span.start.
    pub fn insert_booking(&mut self, booking: Booking) {
        let pos = self
            .bookings
            .binary_search_by_key(&booking.span.start, |b| b.span.start)
            .unwrap_or_else(|e| e);
        self.bookings.insert(pos, booking);
    }

    pub fn remove_booking(&mut self, id: Uuid) -> Option<Booking> {
        if let Some(pos) = self.bookings.iter().position(|b| b.id == id) {
            Some(self.bookings.remove(pos))
        } else {
            None
        }
    }

    /// Bookings whose closed span overlaps the query window.
    /// Binary search skips bookings starting after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Booking> {
        // Everything at index >= right_bound starts after query.end → can't overlap.
        let right_bound = self
            .bookings
            .partition_point(|b| b.span.start <= query.end);
        self.bookings[..right_bound]
            .iter()
            .filter(move |b| b.span.end >= query.start)
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
/// Created/Updated carry the full entity state so replay is a plain apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ClientCreated { client: Client },
    ClientUpdated { client: Client },
    ClientDeleted { id: Uuid },
    EmployeeCreated { employee: Employee },
    EmployeeUpdated { employee: Employee },
    EmployeeDeleted { id: Uuid },
    AmenityCreated { amenity: Amenity },
    AmenityUpdated { amenity: Amenity },
    AmenityDeleted { id: Uuid },
    CategoryCreated { category: RoomCategory },
    CategoryUpdated { category: RoomCategory },
    CategoryDeleted { id: Uuid },
    RoomCreated { room: Room },
    RoomUpdated { room: Room },
    RoomDeleted { id: Uuid },
    ReservationCreated {
        id: Uuid,
        client_id: Uuid,
        room_id: Uuid,
        span: Span,
    },
    ReservationUpdated {
        id: Uuid,
        client_id: Uuid,
        room_id: Uuid,
        span: Span,
    },
    ReservationDeleted { id: Uuid, room_id: Uuid },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub id: Uuid,
    pub client_id: Uuid,
    pub room_id: Uuid,
    pub span: Span,
}
