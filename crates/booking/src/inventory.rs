//! Room inventory: the only path through which bed counts change.

use std::sync::Arc;

use chrono::Utc;
use common::RoomId;
use domain::{NewRoom, Room};
use store::{Store, Transaction};

use crate::error::{BookingServiceError, Result};

/// Owns room records.
///
/// Bed reservations and releases are staged on the caller's transaction so
/// they commit together with the booking write that caused them.
#[derive(Clone)]
pub struct RoomInventory {
    store: Arc<dyn Store>,
}

impl RoomInventory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_room(&self, id: RoomId) -> Result<Room> {
        self.store
            .get_room(id)
            .await?
            .map(|record| record.into_inner())
            .ok_or(BookingServiceError::RoomNotFound(id))
    }

    pub async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        Ok(self.store.list_rooms(available_only).await?)
    }

    /// Adds a room with every bed free.
    #[tracing::instrument(skip(self, input), fields(room_number = %input.room_number))]
    pub async fn add_room(&self, input: NewRoom) -> Result<Room> {
        let room = Room::new(input, Utc::now())?;
        let mut tx = Transaction::begin(self.store.as_ref());
        tx.insert_room(room.clone());
        tx.commit().await?;
        tracing::info!(room_id = %room.id(), capacity = room.capacity(), "room added");
        Ok(room)
    }

    /// Takes `count` beds out of the room.
    pub async fn reserve_beds(
        &self,
        tx: &mut Transaction<'_>,
        room_id: RoomId,
        count: u32,
    ) -> Result<Room> {
        let mut room = tx
            .room(room_id)
            .await?
            .ok_or(BookingServiceError::RoomNotFound(room_id))?;
        room.reserve_beds(count, Utc::now())?;
        tx.update_room(room.clone())?;
        Ok(room)
    }

    /// Puts `count` beds back. Callers release a booking's beds once, on its
    /// transition out of a capacity-holding status.
    pub async fn release_beds(
        &self,
        tx: &mut Transaction<'_>,
        room_id: RoomId,
        count: u32,
    ) -> Result<Room> {
        let mut room = tx
            .room(room_id)
            .await?
            .ok_or(BookingServiceError::RoomNotFound(room_id))?;
        room.release_beds(count, Utc::now())?;
        tx.update_room(room.clone())?;
        Ok(room)
    }
}
