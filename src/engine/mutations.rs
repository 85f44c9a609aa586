use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_no_conflict, validate_span};
use super::{Engine, EngineError};

// ── Partial-update shapes ────────────────────────────────────────
//
// One struct per entity, every field optional. `Option<Option<_>>` on
// nullable fields distinguishes "leave alone" from "clear".

#[derive(Debug, Default, Clone)]
pub struct ClientPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct EmployeePatch {
    pub username: Option<String>,
    pub password_hash: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub position: Option<String>,
    pub department: Option<String>,
    pub hire_date: Option<Option<NaiveDate>>,
    pub date_of_termination: Option<Option<NaiveDate>>,
    pub groups: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone)]
pub struct AmenityPatch {
    pub name: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_per_night: Option<i64>,
    pub amenities: Option<Vec<Uuid>>,
}

#[derive(Debug, Default, Clone)]
pub struct RoomPatch {
    pub number: Option<String>,
    pub category_id: Option<Uuid>,
    pub is_available: Option<bool>,
    pub location: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ReservationPatch {
    pub client_id: Option<Uuid>,
    pub room_id: Option<Uuid>,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

fn check_len(value: &str, max: usize, what: &'static str) -> Result<(), EngineError> {
    if value.len() > max {
        return Err(EngineError::LimitExceeded(what));
    }
    Ok(())
}

impl Engine {
    // ── Clients ──────────────────────────────────────────────

    pub async fn create_client(&self, name: String, email: String) -> Result<Client, EngineError> {
        check_len(&name, MAX_NAME_LEN, "client name too long")?;
        check_len(&email, MAX_EMAIL_LEN, "email too long")?;
        if self.emails.contains_key(&email.to_lowercase()) {
            return Err(EngineError::EmailTaken(email));
        }

        let client = Client {
            id: Uuid::new_v4(),
            name,
            email,
        };
        self.persist(vec![Event::ClientCreated {
            client: client.clone(),
        }])
        .await?;
        self.emails.insert(client.email.to_lowercase(), client.id);
        self.clients.insert(client.id, client.clone());
        Ok(client)
    }

    pub async fn update_client(&self, id: Uuid, patch: ClientPatch) -> Result<Client, EngineError> {
        let mut client = self
            .clients
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        let old_email = client.email.to_lowercase();

        if let Some(name) = patch.name {
            check_len(&name, MAX_NAME_LEN, "client name too long")?;
            client.name = name;
        }
        if let Some(email) = patch.email {
            check_len(&email, MAX_EMAIL_LEN, "email too long")?;
            if let Some(owner) = self.emails.get(&email.to_lowercase())
                && *owner.value() != id {
                    return Err(EngineError::EmailTaken(email));
                }
            client.email = email;
        }

        self.persist(vec![Event::ClientUpdated {
            client: client.clone(),
        }])
        .await?;
        if old_email != client.email.to_lowercase() {
            self.emails.remove(&old_email);
            self.emails.insert(client.email.to_lowercase(), id);
        }
        self.clients.insert(id, client.clone());
        Ok(client)
    }

    /// Delete a client and, storage-layer cascade, every reservation
    /// holding their name.
    pub async fn delete_client(&self, id: Uuid) -> Result<(), EngineError> {
        let client = self
            .clients
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;

        // Lock every schedule in sorted id order so the victim set can't
        // shift under us while the cascade commits.
        let mut room_ids: Vec<Uuid> = self.rooms.iter().map(|e| *e.key()).collect();
        room_ids.sort();
        let mut guards = Vec::with_capacity(room_ids.len());
        for rid in &room_ids {
            if let Some(rs) = self.get_room_state(rid) {
                guards.push(rs.write_owned().await);
            }
        }

        let mut events = Vec::new();
        for guard in &guards {
            for booking in &guard.bookings {
                if booking.client_id == id {
                    events.push(Event::ReservationDeleted {
                        id: booking.id,
                        room_id: guard.room.id,
                    });
                }
            }
        }
        events.push(Event::ClientDeleted { id });
        self.persist(events).await?;

        for guard in guards.iter_mut() {
            let victims: Vec<Uuid> = guard
                .bookings
                .iter()
                .filter(|b| b.client_id == id)
                .map(|b| b.id)
                .collect();
            for victim in victims {
                guard.remove_booking(victim);
                self.reservation_to_room.remove(&victim);
            }
        }
        self.clients.remove(&id);
        self.emails.remove(&client.email.to_lowercase());
        Ok(())
    }

    // ── Employees ────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub async fn create_employee(
        &self,
        username: String,
        password_hash: String,
        email: String,
        first_name: String,
        last_name: String,
        position: String,
        department: String,
        hire_date: Option<NaiveDate>,
        date_of_termination: Option<NaiveDate>,
        groups: Vec<String>,
    ) -> Result<Employee, EngineError> {
        check_len(&username, MAX_USERNAME_LEN, "username too long")?;
        check_len(&email, MAX_EMAIL_LEN, "email too long")?;
        check_len(&position, MAX_NAME_LEN, "position too long")?;
        check_len(&department, MAX_NAME_LEN, "department too long")?;
        validate_groups(&groups)?;
        if self.usernames.contains_key(&username) {
            return Err(EngineError::UsernameTaken(username));
        }

        let employee = Employee {
            id: Uuid::new_v4(),
            username,
            password_hash,
            email,
            first_name,
            last_name,
            position,
            department,
            hire_date,
            date_of_termination,
            groups,
        };
        self.persist(vec![Event::EmployeeCreated {
            employee: employee.clone(),
        }])
        .await?;
        self.usernames
            .insert(employee.username.clone(), employee.id);
        self.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    pub async fn update_employee(
        &self,
        id: Uuid,
        patch: EmployeePatch,
    ) -> Result<Employee, EngineError> {
        let mut employee = self
            .employees
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        let old_username = employee.username.clone();

        if let Some(username) = patch.username {
            check_len(&username, MAX_USERNAME_LEN, "username too long")?;
            if let Some(owner) = self.usernames.get(&username)
                && *owner.value() != id {
                    return Err(EngineError::UsernameTaken(username));
                }
            employee.username = username;
        }
        if let Some(hash) = patch.password_hash {
            employee.password_hash = hash;
        }
        if let Some(email) = patch.email {
            check_len(&email, MAX_EMAIL_LEN, "email too long")?;
            employee.email = email;
        }
        if let Some(v) = patch.first_name {
            check_len(&v, MAX_NAME_LEN, "first name too long")?;
            employee.first_name = v;
        }
        if let Some(v) = patch.last_name {
            check_len(&v, MAX_NAME_LEN, "last name too long")?;
            employee.last_name = v;
        }
        if let Some(v) = patch.position {
            check_len(&v, MAX_NAME_LEN, "position too long")?;
            employee.position = v;
        }
        if let Some(v) = patch.department {
            check_len(&v, MAX_NAME_LEN, "department too long")?;
            employee.department = v;
        }
        if let Some(v) = patch.hire_date {
            employee.hire_date = v;
        }
        if let Some(v) = patch.date_of_termination {
            employee.date_of_termination = v;
        }
        if let Some(groups) = patch.groups {
            validate_groups(&groups)?;
            employee.groups = groups;
        }

        self.persist(vec![Event::EmployeeUpdated {
            employee: employee.clone(),
        }])
        .await?;
        if old_username != employee.username {
            self.usernames.remove(&old_username);
            self.usernames.insert(employee.username.clone(), id);
        }
        self.employees.insert(id, employee.clone());
        Ok(employee)
    }

    pub async fn delete_employee(&self, id: Uuid) -> Result<(), EngineError> {
        let employee = self
            .employees
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        self.persist(vec![Event::EmployeeDeleted { id }]).await?;
        self.employees.remove(&id);
        self.usernames.remove(&employee.username);
        Ok(())
    }

    // ── Amenities ────────────────────────────────────────────

    pub async fn create_amenity(&self, name: String) -> Result<Amenity, EngineError> {
        check_len(&name, MAX_NAME_LEN, "amenity name too long")?;
        let amenity = Amenity {
            id: Uuid::new_v4(),
            name,
        };
        self.persist(vec![Event::AmenityCreated {
            amenity: amenity.clone(),
        }])
        .await?;
        self.amenities.insert(amenity.id, amenity.clone());
        Ok(amenity)
    }

    pub async fn update_amenity(
        &self,
        id: Uuid,
        patch: AmenityPatch,
    ) -> Result<Amenity, EngineError> {
        let mut amenity = self
            .amenities
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;
        if let Some(name) = patch.name {
            check_len(&name, MAX_NAME_LEN, "amenity name too long")?;
            amenity.name = name;
        }
        self.persist(vec![Event::AmenityUpdated {
            amenity: amenity.clone(),
        }])
        .await?;
        self.amenities.insert(id, amenity.clone());
        Ok(amenity)
    }

    /// Delete an amenity, detaching it from every room standard.
    pub async fn delete_amenity(&self, id: Uuid) -> Result<(), EngineError> {
        if !self.amenities.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }

        let mut events = Vec::new();
        let mut touched = Vec::new();
        for entry in self.categories.iter() {
            if entry.value().amenities.contains(&id) {
                let mut category = entry.value().clone();
                category.amenities.retain(|a| *a != id);
                events.push(Event::CategoryUpdated {
                    category: category.clone(),
                });
                touched.push(category);
            }
        }
        events.push(Event::AmenityDeleted { id });
        self.persist(events).await?;

        for category in touched {
            self.categories.insert(category.id, category);
        }
        self.amenities.remove(&id);
        Ok(())
    }

    // ── Room standards ───────────────────────────────────────

    pub async fn create_category(
        &self,
        name: String,
        description: String,
        price_per_night: i64,
        amenities: Vec<Uuid>,
    ) -> Result<RoomCategory, EngineError> {
        check_len(&name, MAX_NAME_LEN, "room standard name too long")?;
        check_len(&description, MAX_DESCRIPTION_LEN, "description too long")?;
        validate_price(price_per_night)?;
        self.validate_amenity_refs(&amenities)?;

        let category = RoomCategory {
            id: Uuid::new_v4(),
            name,
            description,
            price_per_night,
            amenities,
        };
        self.persist(vec![Event::CategoryCreated {
            category: category.clone(),
        }])
        .await?;
        self.categories.insert(category.id, category.clone());
        Ok(category)
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<RoomCategory, EngineError> {
        let mut category = self
            .categories
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(EngineError::NotFound(id))?;

        if let Some(name) = patch.name {
            check_len(&name, MAX_NAME_LEN, "room standard name too long")?;
            category.name = name;
        }
        if let Some(description) = patch.description {
            check_len(&description, MAX_DESCRIPTION_LEN, "description too long")?;
            category.description = description;
        }
        if let Some(price) = patch.price_per_night {
            validate_price(price)?;
            category.price_per_night = price;
        }
        if let Some(amenities) = patch.amenities {
            self.validate_amenity_refs(&amenities)?;
            category.amenities = amenities;
        }

        self.persist(vec![Event::CategoryUpdated {
            category: category.clone(),
        }])
        .await?;
        self.categories.insert(id, category.clone());
        Ok(category)
    }

    /// Delete a room standard. Cascades to its rooms, and through them to
    /// their reservations.
    pub async fn delete_category(&self, id: Uuid) -> Result<(), EngineError> {
        // Excludes room creation under this standard for the whole cascade.
        let _schema = self.category_lock.write().await;
        if !self.categories.contains_key(&id) {
            return Err(EngineError::NotFound(id));
        }

        let states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        let mut affected: Vec<Uuid> = Vec::new();
        for rs in states {
            let guard = rs.read().await;
            if guard.room.category_id == id {
                affected.push(guard.room.id);
            }
        }
        affected.sort();

        let mut guards = Vec::with_capacity(affected.len());
        for rid in &affected {
            if let Some(rs) = self.get_room_state(rid) {
                guards.push(rs.write_owned().await);
            }
        }

        let mut events = Vec::new();
        for guard in &guards {
            for booking in &guard.bookings {
                events.push(Event::ReservationDeleted {
                    id: booking.id,
                    room_id: guard.room.id,
                });
            }
            events.push(Event::RoomDeleted { id: guard.room.id });
        }
        events.push(Event::CategoryDeleted { id });
        self.persist(events).await?;

        for guard in &guards {
            for booking in &guard.bookings {
                self.reservation_to_room.remove(&booking.id);
            }
            self.rooms.remove(&guard.room.id);
        }
        self.categories.remove(&id);
        Ok(())
    }

    fn validate_amenity_refs(&self, amenities: &[Uuid]) -> Result<(), EngineError> {
        if amenities.len() > MAX_AMENITIES_PER_CATEGORY {
            return Err(EngineError::LimitExceeded("too many amenities"));
        }
        for aid in amenities {
            if !self.amenities.contains_key(aid) {
                return Err(EngineError::UnknownReference {
                    field: "amenities",
                    id: *aid,
                });
            }
        }
        Ok(())
    }

    // ── Rooms ────────────────────────────────────────────────

    pub async fn create_room(
        &self,
        number: String,
        category_id: Uuid,
        is_available: bool,
        location: String,
    ) -> Result<Room, EngineError> {
        check_len(&number, MAX_ROOM_NUMBER_LEN, "room number too long")?;
        check_len(&location, MAX_LOCATION_LEN, "location too long")?;

        // Held until the room is in the map, so a standard's delete cascade
        // either sees this room or rejects it, never races past it.
        let _schema = self.category_lock.read().await;
        if !self.categories.contains_key(&category_id) {
            return Err(EngineError::UnknownReference {
                field: "room_standard",
                id: category_id,
            });
        }

        let room = Room {
            id: Uuid::new_v4(),
            number,
            category_id,
            is_available,
            location,
        };
        self.persist(vec![Event::RoomCreated { room: room.clone() }])
            .await?;
        self.rooms
            .insert(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
        Ok(room)
    }

    pub async fn update_room(&self, id: Uuid, patch: RoomPatch) -> Result<Room, EngineError> {
        // Lock order: standard lock before the room lock, as everywhere.
        let _schema = if patch.category_id.is_some() {
            Some(self.category_lock.read().await)
        } else {
            None
        };
        let rs = self.get_room_state(&id).ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;
        let mut room = guard.room.clone();

        if let Some(number) = patch.number {
            check_len(&number, MAX_ROOM_NUMBER_LEN, "room number too long")?;
            room.number = number;
        }
        if let Some(category_id) = patch.category_id {
            if !self.categories.contains_key(&category_id) {
                return Err(EngineError::UnknownReference {
                    field: "room_standard",
                    id: category_id,
                });
            }
            room.category_id = category_id;
        }
        if let Some(flag) = patch.is_available {
            room.is_available = flag;
        }
        if let Some(location) = patch.location {
            check_len(&location, MAX_LOCATION_LEN, "location too long")?;
            room.location = location;
        }

        self.persist(vec![Event::RoomUpdated { room: room.clone() }])
            .await?;
        guard.room = room.clone();
        Ok(room)
    }

    /// Delete a room and, storage-layer cascade, its reservations.
    pub async fn delete_room(&self, id: Uuid) -> Result<(), EngineError> {
        let rs = self.get_room_state(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.write().await;

        let mut events: Vec<Event> = guard
            .bookings
            .iter()
            .map(|b| Event::ReservationDeleted {
                id: b.id,
                room_id: id,
            })
            .collect();
        events.push(Event::RoomDeleted { id });
        self.persist(events).await?;

        for booking in &guard.bookings {
            self.reservation_to_room.remove(&booking.id);
        }
        drop(guard);
        self.rooms.remove(&id);
        Ok(())
    }

    // ── Reservations ─────────────────────────────────────────

    pub async fn create_reservation(
        &self,
        client_id: Uuid,
        room_id: Uuid,
        span: Span,
    ) -> Result<Reservation, EngineError> {
        validate_span(&span)?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::UnknownReference {
                field: "room",
                id: room_id,
            })?;
        let mut guard = rs.write().await;

        // Checked under the room lock: a client-delete cascade locks every
        // schedule, so it cannot run between this check and the commit.
        if !self.clients.contains_key(&client_id) {
            return Err(EngineError::UnknownReference {
                field: "client",
                id: client_id,
            });
        }

        if let Err(e) = check_no_conflict(&guard, &span, None) {
            metrics::counter!(crate::observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let id = Uuid::new_v4();
        self.persist(vec![Event::ReservationCreated {
            id,
            client_id,
            room_id,
            span,
        }])
        .await?;
        guard.insert_booking(Booking {
            id,
            client_id,
            span,
        });
        self.reservation_to_room.insert(id, room_id);
        Ok(Reservation {
            id,
            client_id,
            room_id,
            span,
        })
    }

    /// Reschedule a reservation. May move it between rooms; when it does,
    /// both schedules are locked in sorted id order before the conflict
    /// check runs against the target.
    pub async fn update_reservation(
        &self,
        id: Uuid,
        patch: ReservationPatch,
    ) -> Result<Reservation, EngineError> {
        let old_room_id = self
            .get_room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let new_room_id = patch.room_id.unwrap_or(old_room_id);

        let old_rs = self
            .get_room_state(&old_room_id)
            .ok_or(EngineError::NotFound(id))?;
        let new_rs = if new_room_id == old_room_id {
            None
        } else {
            Some(
                self.get_room_state(&new_room_id)
                    .ok_or(EngineError::UnknownReference {
                        field: "room",
                        id: new_room_id,
                    })?,
            )
        };

        // Lock order: ascending room id, to match every other multi-room path.
        let (mut old_guard, mut new_guard) = match new_rs {
            None => (old_rs.write_owned().await, None),
            Some(new_rs) if new_room_id < old_room_id => {
                let n = new_rs.write_owned().await;
                (old_rs.write_owned().await, Some(n))
            }
            Some(new_rs) => {
                let o = old_rs.write_owned().await;
                (o, Some(new_rs.write_owned().await))
            }
        };

        let current = old_guard
            .bookings
            .iter()
            .find(|b| b.id == id)
            .copied()
            .ok_or(EngineError::NotFound(id))?;

        // Under the schedule locks for the same reason as on create.
        if let Some(client_id) = patch.client_id
            && !self.clients.contains_key(&client_id) {
                return Err(EngineError::UnknownReference {
                    field: "client",
                    id: client_id,
                });
            }

        let span = Span {
            start: patch.start.unwrap_or(current.span.start),
            end: patch.end.unwrap_or(current.span.end),
        };
        validate_span(&span)?;
        let client_id = patch.client_id.unwrap_or(current.client_id);

        let target = new_guard.as_deref().unwrap_or(&old_guard);
        let exclude = (new_room_id == old_room_id).then_some(id);
        if let Err(e) = check_no_conflict(target, &span, exclude) {
            metrics::counter!(crate::observability::RESERVATION_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        self.persist(vec![Event::ReservationUpdated {
            id,
            client_id,
            room_id: new_room_id,
            span,
        }])
        .await?;

        old_guard.remove_booking(id);
        let booking = Booking {
            id,
            client_id,
            span,
        };
        match new_guard.as_mut() {
            Some(guard) => guard.insert_booking(booking),
            None => old_guard.insert_booking(booking),
        }
        self.reservation_to_room.insert(id, new_room_id);
        Ok(Reservation {
            id,
            client_id,
            room_id: new_room_id,
            span,
        })
    }

    pub async fn delete_reservation(&self, id: Uuid) -> Result<(), EngineError> {
        let room_id = self
            .get_room_for_reservation(&id)
            .ok_or(EngineError::NotFound(id))?;
        let rs = self
            .get_room_state(&room_id)
            .ok_or(EngineError::NotFound(id))?;
        let mut guard = rs.write().await;

        self.persist(vec![Event::ReservationDeleted { id, room_id }])
            .await?;
        guard.remove_booking(id);
        self.reservation_to_room.remove(&id);
        Ok(())
    }

    // ── Compaction ───────────────────────────────────────────

    /// Rewrite the WAL with only the events needed to recreate the
    /// current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let mut events = Vec::new();
        for entry in self.amenities.iter() {
            events.push(Event::AmenityCreated {
                amenity: entry.value().clone(),
            });
        }
        for entry in self.categories.iter() {
            events.push(Event::CategoryCreated {
                category: entry.value().clone(),
            });
        }
        for entry in self.clients.iter() {
            events.push(Event::ClientCreated {
                client: entry.value().clone(),
            });
        }
        for entry in self.employees.iter() {
            events.push(Event::EmployeeCreated {
                employee: entry.value().clone(),
            });
        }
        let room_states: Vec<_> = self.rooms.iter().map(|e| e.value().clone()).collect();
        for rs in room_states {
            let guard = rs.read().await;
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            for booking in &guard.bookings {
                events.push(Event::ReservationCreated {
                    id: booking.id,
                    client_id: booking.client_id,
                    room_id: guard.room.id,
                    span: booking.span,
                });
            }
        }

        self.send_compact(events).await
    }
}

fn validate_groups(groups: &[String]) -> Result<(), EngineError> {
    if groups.len() > MAX_GROUPS_PER_EMPLOYEE {
        return Err(EngineError::LimitExceeded("too many groups"));
    }
    for group in groups {
        if group.len() > MAX_GROUP_NAME_LEN {
            return Err(EngineError::LimitExceeded("group name too long"));
        }
    }
    Ok(())
}

fn validate_price(price: i64) -> Result<(), EngineError> {
    if price < 0 {
        return Err(EngineError::LimitExceeded("price must not be negative"));
    }
    Ok(())
}
