mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;

pub use availability::{available_rooms, RoomSnapshot};
pub use error::EngineError;
pub use mutations::{
    AmenityPatch, CategoryPatch, ClientPatch, EmployeePatch, ReservationPatch, RoomPatch,
};
pub use queries::Page;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use uuid::Uuid;

use crate::model::*;
use crate::wal::Wal;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        /// One logical mutation. Cascades ship several events so their
        /// frames land in the log together, children first.
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { events, response } => {
                let mut batch = vec![(events, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { events, response }) => {
                            batch.push((events, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

type AppendBatch = Vec<(Vec<Event>, oneshot::Sender<io::Result<()>>)>;

fn flush_and_respond(wal: &mut Wal, batch: &mut AppendBatch) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(wal: &mut Wal, batch: &AppendBatch) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    'outer: for (events, _) in batch.iter() {
        for event in events {
            if let Err(e) = wal.append_buffered(event) {
                append_err = Some(e);
                break 'outer;
            }
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The whole back office in memory: entity maps plus one lockable
/// schedule per room, rebuilt from the WAL on startup.
pub struct Engine {
    pub(super) clients: DashMap<Uuid, Client>,
    pub(super) employees: DashMap<Uuid, Employee>,
    pub(super) amenities: DashMap<Uuid, Amenity>,
    pub(super) categories: DashMap<Uuid, RoomCategory>,
    pub(super) rooms: DashMap<Uuid, SharedRoomState>,
    /// Reverse lookup: reservation id → room id.
    pub(super) reservation_to_room: DashMap<Uuid, Uuid>,
    /// Lowercased email → client id (unique-email enforcement).
    pub(super) emails: DashMap<String, Uuid>,
    /// Username → employee id (unique-username enforcement).
    pub(super) usernames: DashMap<String, Uuid>,
    /// Read-held while a room is created (or re-tiered) under a standard,
    /// write-held while a standard's delete cascade runs. Always acquired
    /// before any room lock.
    pub(super) category_lock: RwLock<()>,
    wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            clients: DashMap::new(),
            employees: DashMap::new(),
            amenities: DashMap::new(),
            categories: DashMap::new(),
            rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
            emails: DashMap::new(),
            usernames: DashMap::new(),
            category_lock: RwLock::new(()),
            wal_tx,
        };

        // Replay — we're the sole owner of the room Arcs here, so try_write
        // always succeeds instantly. Never use blocking_write: this may run
        // inside an async context.
        for event in events {
            engine.apply_replayed(event);
        }

        Ok(engine)
    }

    fn apply_replayed(&self, event: Event) {
        match event {
            Event::ClientCreated { client } | Event::ClientUpdated { client } => {
                if let Some(old) = self.clients.get(&client.id) {
                    self.emails.remove(&old.email.to_lowercase());
                }
                self.emails.insert(client.email.to_lowercase(), client.id);
                self.clients.insert(client.id, client);
            }
            Event::ClientDeleted { id } => {
                if let Some((_, old)) = self.clients.remove(&id) {
                    self.emails.remove(&old.email.to_lowercase());
                }
            }
            Event::EmployeeCreated { employee } | Event::EmployeeUpdated { employee } => {
                if let Some(old) = self.employees.get(&employee.id) {
                    self.usernames.remove(&old.username);
                }
                self.usernames.insert(employee.username.clone(), employee.id);
                self.employees.insert(employee.id, employee);
            }
            Event::EmployeeDeleted { id } => {
                if let Some((_, old)) = self.employees.remove(&id) {
                    self.usernames.remove(&old.username);
                }
            }
            Event::AmenityCreated { amenity } | Event::AmenityUpdated { amenity } => {
                self.amenities.insert(amenity.id, amenity);
            }
            Event::AmenityDeleted { id } => {
                self.amenities.remove(&id);
            }
            Event::CategoryCreated { category } | Event::CategoryUpdated { category } => {
                self.categories.insert(category.id, category);
            }
            Event::CategoryDeleted { id } => {
                self.categories.remove(&id);
            }
            Event::RoomCreated { room } => {
                self.rooms
                    .insert(room.id, Arc::new(RwLock::new(RoomState::new(room))));
            }
            Event::RoomUpdated { room } => {
                if let Some(entry) = self.rooms.get(&room.id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    guard.room = room;
                }
            }
            Event::RoomDeleted { id } => {
                if let Some((_, rs)) = self.rooms.remove(&id) {
                    let guard = rs.try_read().expect("replay: uncontended read");
                    for booking in &guard.bookings {
                        self.reservation_to_room.remove(&booking.id);
                    }
                }
            }
            Event::ReservationCreated { id, client_id, room_id, span }
            | Event::ReservationUpdated { id, client_id, room_id, span } => {
                // An update may move the reservation between rooms.
                if let Some(old_room) = self.reservation_to_room.get(&id).map(|e| *e.value())
                    && let Some(entry) = self.rooms.get(&old_room) {
                        let rs = entry.value().clone();
                        let mut guard = rs.try_write().expect("replay: uncontended write");
                        guard.remove_booking(id);
                    }
                if let Some(entry) = self.rooms.get(&room_id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    guard.insert_booking(Booking { id, client_id, span });
                    self.reservation_to_room.insert(id, room_id);
                }
            }
            Event::ReservationDeleted { id, room_id } => {
                if let Some(entry) = self.rooms.get(&room_id) {
                    let rs = entry.value().clone();
                    let mut guard = rs.try_write().expect("replay: uncontended write");
                    guard.remove_booking(id);
                }
                self.reservation_to_room.remove(&id);
            }
        }
    }

    /// Write one logical mutation (possibly several cascade events) to the
    /// WAL via the background group-commit writer.
    pub(super) async fn persist(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub(super) async fn send_compact(&self, events: Vec<Event>) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    pub fn get_room_state(&self, id: &Uuid) -> Option<SharedRoomState> {
        self.rooms.get(id).map(|e| e.value().clone())
    }

    pub fn get_room_for_reservation(&self, reservation_id: &Uuid) -> Option<Uuid> {
        self.reservation_to_room
            .get(reservation_id)
            .map(|e| *e.value())
    }
}
