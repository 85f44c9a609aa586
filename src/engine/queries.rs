use chrono::NaiveDate;
use uuid::Uuid;

use crate::limits::MAX_QUERY_WINDOW_MS;
use crate::model::*;

use super::availability::{available_rooms, RoomSnapshot};
use super::{Engine, EngineError};

/// 1-based page selector for the list endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: usize,
    pub size: usize,
}

impl Page {
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        let start = self.number.saturating_sub(1).saturating_mul(self.size);
        items.into_iter().skip(start).take(self.size).collect()
    }
}

impl Engine {
    // ── Point lookups ────────────────────────────────────────

    pub fn get_client(&self, id: Uuid) -> Result<Client, EngineError> {
        self.clients
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))
    }

    pub fn get_employee(&self, id: Uuid) -> Result<Employee, EngineError> {
        self.employees
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))
    }

    pub fn get_employee_by_username(&self, username: &str) -> Option<Employee> {
        let id = *self.usernames.get(username)?.value();
        self.employees.get(&id).map(|e| e.value().clone())
    }

    pub fn get_amenity(&self, id: Uuid) -> Result<Amenity, EngineError> {
        self.amenities
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))
    }

    pub fn get_category(&self, id: Uuid) -> Result<RoomCategory, EngineError> {
        self.categories
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn get_room(&self, id: Uuid) -> Result<Room, EngineError> {
        let rs = self.get_room_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        Ok(guard.room.clone())
    }

    pub async fn get_reservation(&self, id: Uuid) -> Result<Reservation, EngineError> {
        let room_id = self
            .get_room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .map(|b| Reservation {
                id: b.id,
                client_id: b.client_id,
                room_id,
                span: b.span,
            })
            .ok_or(EngineError::NotFound(id))
    }

    // ── Listings (stable sort orders, then paginated) ────────

    pub fn list_clients(&self, page: Page) -> Vec<Client> {
        let mut clients: Vec<Client> = self.clients.iter().map(|e| e.value().clone()).collect();
        clients.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        page.slice(clients)
    }

    pub fn list_employees(&self, page: Page) -> Vec<Employee> {
        let mut employees: Vec<Employee> =
            self.employees.iter().map(|e| e.value().clone()).collect();
        employees.sort_by(|a, b| a.username.cmp(&b.username));
        page.slice(employees)
    }

    pub fn list_amenities(&self, page: Page) -> Vec<Amenity> {
        let mut amenities: Vec<Amenity> =
            self.amenities.iter().map(|e| e.value().clone()).collect();
        amenities.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        page.slice(amenities)
    }

    pub fn list_categories(&self, page: Page) -> Vec<RoomCategory> {
        let mut categories: Vec<RoomCategory> =
            self.categories.iter().map(|e| e.value().clone()).collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        page.slice(categories)
    }

    pub async fn list_rooms(&self, page: Page) -> Vec<Room> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut rooms = Vec::with_capacity(states.len());
        for rs in states {
            rooms.push(rs.read().await.room.clone());
        }
        rooms.sort_by(|a, b| a.number.cmp(&b.number).then(a.id.cmp(&b.id)));
        page.slice(rooms)
    }

    pub async fn list_reservations(&self, page: Page) -> Vec<Reservation> {
        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut reservations = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            for booking in &guard.bookings {
                reservations.push(Reservation {
                    id: booking.id,
                    client_id: booking.client_id,
                    room_id: guard.room.id,
                    span: booking.span,
                });
            }
        }
        reservations.sort_by(|a, b| a.span.start.cmp(&b.span.start).then(a.id.cmp(&b.id)));
        page.slice(reservations)
    }

    // ── Availability ─────────────────────────────────────────

    /// Rooms free for every night of the inclusive `[start, end]` calendar
    /// window, optionally narrowed to one room standard. A standard id that
    /// matches nothing yields an empty list rather than an error.
    pub async fn rooms_available(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        category: Option<Uuid>,
    ) -> Result<Vec<Room>, EngineError> {
        let query = day_span(start, end).ok_or(EngineError::InvalidRange)?;
        if query.duration_ms() > MAX_QUERY_WINDOW_MS {
            return Err(EngineError::LimitExceeded("query window too wide"));
        }

        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut snapshot = Vec::with_capacity(states.len());
        for rs in states {
            let guard = rs.read().await;
            snapshot.push(RoomSnapshot {
                room: guard.room.clone(),
                booked: guard.overlapping(&query).map(|b| b.span).collect(),
            });
        }

        Ok(available_rooms(&snapshot, &query, category))
    }
}
