use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{Booking, BookingReference, BookingStatus, Resident, Room};
use tokio::sync::RwLock;

use crate::{Change, ChangeSet, Result, Store, StoreError, Version, Versioned};

#[derive(Default)]
struct Tables {
    rooms: HashMap<RoomId, Versioned<Room>>,
    residents: HashMap<ResidentId, Versioned<Resident>>,
    bookings: HashMap<BookingId, Versioned<Booking>>,
    references: HashMap<BookingReference, BookingId>,
}

impl Tables {
    /// Checks every change against the current state without applying any.
    fn validate(&self, changes: &ChangeSet) -> Result<()> {
        let mut room_numbers = HashSet::new();
        let mut users = HashSet::new();
        let mut references = HashSet::new();

        for change in changes.iter() {
            match change {
                Change::InsertRoom(room) => {
                    let taken = self
                        .rooms
                        .values()
                        .any(|r| r.value.room_number() == room.room_number());
                    if taken || !room_numbers.insert(room.room_number()) {
                        return Err(StoreError::DuplicateRoomNumber(room.room_number().to_string()));
                    }
                }
                Change::UpdateRoom { room, expected } => {
                    check_version("room", room.id(), self.rooms.get(&room.id()), *expected)?;
                }
                Change::InsertResident(resident) => {
                    let taken = self
                        .residents
                        .values()
                        .any(|r| r.value.user_id() == resident.user_id());
                    if taken || !users.insert(resident.user_id()) {
                        return Err(StoreError::DuplicateResident(resident.user_id()));
                    }
                }
                Change::UpdateResident { resident, expected } => {
                    check_version(
                        "resident",
                        resident.id(),
                        self.residents.get(&resident.id()),
                        *expected,
                    )?;
                }
                Change::InsertBooking(booking) => {
                    if self.references.contains_key(booking.reference())
                        || !references.insert(booking.reference())
                    {
                        return Err(StoreError::DuplicateReference(booking.reference().to_string()));
                    }
                }
                Change::UpdateBooking { booking, expected } => {
                    check_version(
                        "booking",
                        booking.id(),
                        self.bookings.get(&booking.id()),
                        *expected,
                    )?;
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, changes: ChangeSet) {
        for change in changes {
            match change {
                Change::InsertRoom(room) => {
                    self.rooms
                        .insert(room.id(), Versioned::new(room, Version::first()));
                }
                Change::UpdateRoom { room, expected } => {
                    self.rooms
                        .insert(room.id(), Versioned::new(room, expected.next()));
                }
                Change::InsertResident(resident) => {
                    self.residents
                        .insert(resident.id(), Versioned::new(resident, Version::first()));
                }
                Change::UpdateResident { resident, expected } => {
                    self.residents
                        .insert(resident.id(), Versioned::new(resident, expected.next()));
                }
                Change::InsertBooking(booking) => {
                    self.references
                        .insert(booking.reference().clone(), booking.id());
                    self.bookings
                        .insert(booking.id(), Versioned::new(booking, Version::first()));
                }
                Change::UpdateBooking { booking, expected } => {
                    self.bookings
                        .insert(booking.id(), Versioned::new(booking, expected.next()));
                }
            }
        }
    }

    fn bookings_where(&self, predicate: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut bookings: Vec<_> = self
            .bookings
            .values()
            .filter(|b| predicate(&b.value))
            .map(|b| b.value.clone())
            .collect();
        bookings.sort_by_key(|b| (b.created_at(), b.id()));
        bookings
    }
}

fn check_version<T, I: std::fmt::Display>(
    entity: &'static str,
    id: I,
    current: Option<&Versioned<T>>,
    expected: Version,
) -> Result<()> {
    match current {
        Some(record) if record.version == expected => Ok(()),
        _ => Err(StoreError::ConcurrencyConflict {
            entity,
            id: id.to_string(),
            expected,
        }),
    }
}

/// In-memory store implementation.
///
/// Provides the same interface and the same conflict semantics as the
/// PostgreSQL implementation; a commit holds the write lock while it validates
/// and applies its change set.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.tables.read().await.bookings.len()
    }

    /// Clears all tables.
    pub async fn clear(&self) {
        *self.tables.write().await = Tables::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_room(&self, id: RoomId) -> Result<Option<Versioned<Room>>> {
        Ok(self.tables.read().await.rooms.get(&id).cloned())
    }

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        let tables = self.tables.read().await;
        let mut rooms: Vec<_> = tables
            .rooms
            .values()
            .filter(|r| !available_only || r.value.is_available())
            .map(|r| r.value.clone())
            .collect();
        rooms.sort_by(|a, b| a.room_number().cmp(b.room_number()));
        Ok(rooms)
    }

    async fn get_resident(&self, id: ResidentId) -> Result<Option<Versioned<Resident>>> {
        Ok(self.tables.read().await.residents.get(&id).cloned())
    }

    async fn find_resident_by_user(&self, user_id: UserId) -> Result<Option<Versioned<Resident>>> {
        Ok(self
            .tables
            .read()
            .await
            .residents
            .values()
            .find(|r| r.value.user_id() == user_id)
            .cloned())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Versioned<Booking>>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_booking_by_reference(
        &self,
        reference: &BookingReference,
    ) -> Result<Option<Versioned<Booking>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .references
            .get(reference)
            .and_then(|id| tables.bookings.get(id))
            .cloned())
    }

    async fn bookings_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings_where(|b| b.resident_id() == resident_id))
    }

    async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings_where(|b| b.user_id() == user_id))
    }

    async fn bookings_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        Ok(self
            .tables
            .read()
            .await
            .bookings_where(|b| b.status() == status))
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let mut tables = self.tables.write().await;
        if let Err(e) = tables.validate(&changes) {
            if matches!(e, StoreError::ConcurrencyConflict { .. }) {
                metrics::counter!("store_commit_conflicts_total").increment(1);
            }
            tracing::debug!(error = %e, "rejected change set");
            return Err(e);
        }
        tracing::trace!(changes = changes.len(), "applying change set");
        tables.apply(changes);
        Ok(())
    }
}
