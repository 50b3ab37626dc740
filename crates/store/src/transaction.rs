//! Unit of work over a [`Store`].

use std::collections::HashMap;
use std::hash::Hash;

use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{Booking, BookingReference, Resident, Room};

use crate::{Change, ChangeSet, Result, Store, StoreError, Version, Versioned};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    /// Read from the store and unchanged.
    Clean(Version),
    /// Read at the given version and modified since.
    Dirty(Version),
    /// Created in this transaction.
    New,
}

#[derive(Debug, Clone)]
struct Tracked<T> {
    value: T,
    state: TrackState,
}

impl<T> Tracked<T> {
    fn loaded(record: Versioned<T>) -> Self {
        Self {
            value: record.value,
            state: TrackState::Clean(record.version),
        }
    }

    fn new(value: T) -> Self {
        Self {
            value,
            state: TrackState::New,
        }
    }

    fn replace(&mut self, value: T) {
        self.value = value;
        if let TrackState::Clean(version) = self.state {
            self.state = TrackState::Dirty(version);
        }
    }
}

/// Records read and written by one operation.
///
/// Reads go through the store once per record and are cached together with
/// their version; later reads see this transaction's own staged writes.
/// Nothing reaches the store until [`Transaction::commit`], which hands every
/// staged write to [`Store::commit`] as a single change set.
pub struct Transaction<'s> {
    store: &'s dyn Store,
    rooms: HashMap<RoomId, Tracked<Room>>,
    residents: HashMap<ResidentId, Tracked<Resident>>,
    bookings: HashMap<BookingId, Tracked<Booking>>,
}

impl<'s> Transaction<'s> {
    /// Starts an empty unit of work.
    pub fn begin(store: &'s dyn Store) -> Self {
        Self {
            store,
            rooms: HashMap::new(),
            residents: HashMap::new(),
            bookings: HashMap::new(),
        }
    }

    pub async fn room(&mut self, id: RoomId) -> Result<Option<Room>> {
        if let Some(tracked) = self.rooms.get(&id) {
            return Ok(Some(tracked.value.clone()));
        }
        let Some(record) = self.store.get_room(id).await? else {
            return Ok(None);
        };
        let room = record.value.clone();
        self.rooms.insert(id, Tracked::loaded(record));
        Ok(Some(room))
    }

    pub async fn resident(&mut self, id: ResidentId) -> Result<Option<Resident>> {
        if let Some(tracked) = self.residents.get(&id) {
            return Ok(Some(tracked.value.clone()));
        }
        let Some(record) = self.store.get_resident(id).await? else {
            return Ok(None);
        };
        Ok(Some(self.track_resident(record)))
    }

    pub async fn resident_for_user(&mut self, user_id: UserId) -> Result<Option<Resident>> {
        if let Some(tracked) = self
            .residents
            .values()
            .find(|t| t.value.user_id() == user_id)
        {
            return Ok(Some(tracked.value.clone()));
        }
        let Some(record) = self.store.find_resident_by_user(user_id).await? else {
            return Ok(None);
        };
        Ok(Some(self.track_resident(record)))
    }

    pub async fn booking(&mut self, id: BookingId) -> Result<Option<Booking>> {
        if let Some(tracked) = self.bookings.get(&id) {
            return Ok(Some(tracked.value.clone()));
        }
        let Some(record) = self.store.get_booking(id).await? else {
            return Ok(None);
        };
        Ok(Some(self.track_booking(record)))
    }

    pub async fn booking_by_reference(
        &mut self,
        reference: &BookingReference,
    ) -> Result<Option<Booking>> {
        if let Some(tracked) = self
            .bookings
            .values()
            .find(|t| t.value.reference() == reference)
        {
            return Ok(Some(tracked.value.clone()));
        }
        let Some(record) = self.store.find_booking_by_reference(reference).await? else {
            return Ok(None);
        };
        Ok(Some(self.track_booking(record)))
    }

    /// Bookings of a resident, including writes staged in this transaction.
    ///
    /// The returned bookings are not tracked; load one with
    /// [`Transaction::booking`] before updating it.
    pub async fn bookings_for_resident(&mut self, resident_id: ResidentId) -> Result<Vec<Booking>> {
        let mut bookings = self.store.bookings_for_resident(resident_id).await?;
        for booking in &mut bookings {
            if let Some(tracked) = self.bookings.get(&booking.id()) {
                *booking = tracked.value.clone();
            }
        }
        bookings.extend(
            self.bookings
                .values()
                .filter(|t| t.state == TrackState::New && t.value.resident_id() == resident_id)
                .map(|t| t.value.clone()),
        );
        Ok(bookings)
    }

    pub fn insert_room(&mut self, room: Room) {
        self.rooms.insert(room.id(), Tracked::new(room));
    }

    pub fn insert_resident(&mut self, resident: Resident) {
        self.residents.insert(resident.id(), Tracked::new(resident));
    }

    pub fn insert_booking(&mut self, booking: Booking) {
        self.bookings.insert(booking.id(), Tracked::new(booking));
    }

    /// Stages a new state for a room read earlier in this transaction.
    pub fn update_room(&mut self, room: Room) -> Result<()> {
        stage(&mut self.rooms, room.id(), room, "room")
    }

    /// Stages a new state for a resident read earlier in this transaction.
    pub fn update_resident(&mut self, resident: Resident) -> Result<()> {
        stage(&mut self.residents, resident.id(), resident, "resident")
    }

    /// Stages a new state for a booking read earlier in this transaction.
    pub fn update_booking(&mut self, booking: Booking) -> Result<()> {
        stage(&mut self.bookings, booking.id(), booking, "booking")
    }

    /// Returns true if any write is staged.
    pub fn has_changes(&self) -> bool {
        let dirty = |state: &TrackState| !matches!(state, TrackState::Clean(_));
        self.rooms.values().any(|t| dirty(&t.state))
            || self.residents.values().any(|t| dirty(&t.state))
            || self.bookings.values().any(|t| dirty(&t.state))
    }

    /// Collects the staged writes.
    ///
    /// Rooms come before residents and residents before bookings, each group
    /// sorted by id, so concurrent commits touch rows in the same order.
    pub fn into_change_set(self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for (_, tracked) in sorted(self.rooms) {
            match tracked.state {
                TrackState::New => changes.push(Change::InsertRoom(tracked.value)),
                TrackState::Dirty(expected) => changes.push(Change::UpdateRoom {
                    room: tracked.value,
                    expected,
                }),
                TrackState::Clean(_) => {}
            }
        }
        for (_, tracked) in sorted(self.residents) {
            match tracked.state {
                TrackState::New => changes.push(Change::InsertResident(tracked.value)),
                TrackState::Dirty(expected) => changes.push(Change::UpdateResident {
                    resident: tracked.value,
                    expected,
                }),
                TrackState::Clean(_) => {}
            }
        }
        for (_, tracked) in sorted(self.bookings) {
            match tracked.state {
                TrackState::New => changes.push(Change::InsertBooking(tracked.value)),
                TrackState::Dirty(expected) => changes.push(Change::UpdateBooking {
                    booking: tracked.value,
                    expected,
                }),
                TrackState::Clean(_) => {}
            }
        }
        changes
    }

    /// Commits every staged write atomically. A transaction with no writes
    /// commits trivially.
    pub async fn commit(self) -> Result<()> {
        let store = self.store;
        let changes = self.into_change_set();
        if changes.is_empty() {
            return Ok(());
        }
        store.commit(changes).await
    }

    fn track_resident(&mut self, record: Versioned<Resident>) -> Resident {
        let id = record.value.id();
        self.residents
            .entry(id)
            .or_insert_with(|| Tracked::loaded(record))
            .value
            .clone()
    }

    fn track_booking(&mut self, record: Versioned<Booking>) -> Booking {
        let id = record.value.id();
        self.bookings
            .entry(id)
            .or_insert_with(|| Tracked::loaded(record))
            .value
            .clone()
    }
}

fn stage<K, T>(map: &mut HashMap<K, Tracked<T>>, id: K, value: T, entity: &'static str) -> Result<()>
where
    K: Eq + Hash + std::fmt::Display,
{
    match map.get_mut(&id) {
        Some(tracked) => {
            tracked.replace(value);
            Ok(())
        }
        None => Err(StoreError::NotLoaded {
            entity,
            id: id.to_string(),
        }),
    }
}

fn sorted<K: Ord, T>(map: HashMap<K, T>) -> Vec<(K, T)> {
    let mut entries: Vec<_> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use domain::{Money, NewRoom, RoomType};

    use super::*;
    use crate::InMemoryStore;

    fn new_room(number: &str, capacity: u32) -> Room {
        Room::new(
            NewRoom {
                room_number: number.to_string(),
                room_type: RoomType::Ac,
                price_per_night: Money::from_major(50),
                capacity,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn staged_writes_are_visible_before_commit_only_to_the_transaction() {
        let store = InMemoryStore::new();
        let room = new_room("101", 2);
        let id = room.id();

        let mut tx = Transaction::begin(&store);
        tx.insert_room(room);
        assert!(tx.room(id).await.unwrap().is_some());
        assert!(store.get_room(id).await.unwrap().is_none());

        tx.commit().await.unwrap();
        let stored = store.get_room(id).await.unwrap().unwrap();
        assert_eq!(stored.version, Version::first());
    }

    #[tokio::test]
    async fn update_requires_prior_read() {
        let store = InMemoryStore::new();
        let mut tx = Transaction::begin(&store);
        let err = tx.update_room(new_room("102", 1)).unwrap_err();
        assert!(matches!(err, StoreError::NotLoaded { entity: "room", .. }));
    }

    #[tokio::test]
    async fn read_only_transaction_commits_nothing() {
        let store = InMemoryStore::new();
        let room = new_room("103", 1);
        let id = room.id();
        let mut tx = Transaction::begin(&store);
        tx.insert_room(room);
        tx.commit().await.unwrap();

        let mut tx = Transaction::begin(&store);
        tx.room(id).await.unwrap();
        assert!(!tx.has_changes());
        tx.commit().await.unwrap();
        assert_eq!(store.get_room(id).await.unwrap().unwrap().version, Version::first());
    }

    #[tokio::test]
    async fn stale_read_fails_to_commit() {
        let store = InMemoryStore::new();
        let room = new_room("104", 1);
        let id = room.id();
        let mut tx = Transaction::begin(&store);
        tx.insert_room(room);
        tx.commit().await.unwrap();

        let mut first = Transaction::begin(&store);
        let mut second = Transaction::begin(&store);
        let mut a = first.room(id).await.unwrap().unwrap();
        let mut b = second.room(id).await.unwrap().unwrap();

        a.reserve_beds(1, Utc::now()).unwrap();
        b.reserve_beds(1, Utc::now()).unwrap();
        first.update_room(a).unwrap();
        second.update_room(b).unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert!(err.is_retryable());

        let stored = store.get_room(id).await.unwrap().unwrap();
        assert_eq!(stored.value.bed_remaining(), 0);
        assert_eq!(stored.version, Version::first().next());
    }
}
