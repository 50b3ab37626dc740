//! Room bed inventory.

mod state;

pub use state::{RoomStatus, RoomType};

use chrono::{DateTime, Utc};
use common::RoomId;
use serde::Serialize;
use thiserror::Error;

use crate::Money;

/// Errors that can occur during room operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Room has no free bed at all.
    #[error("Room {0} is not available")]
    Unavailable(RoomId),

    /// Room has free beds, but fewer than requested.
    #[error("Room {room_id} has {remaining} bed(s) remaining, {requested} requested")]
    InsufficientBeds {
        room_id: RoomId,
        requested: u32,
        remaining: u32,
    },

    /// Releasing would push the free bed count above capacity.
    #[error("Releasing {count} bed(s) would exceed capacity {capacity} of room {room_id}")]
    ReleaseExceedsCapacity {
        room_id: RoomId,
        count: u32,
        capacity: u32,
    },

    /// Bed counts must be greater than zero.
    #[error("Invalid bed count: {0} (must be greater than 0)")]
    InvalidBedCount(u32),

    /// Room number must not be blank.
    #[error("Room number is required")]
    RoomNumberRequired,

    /// Nightly price must be positive.
    #[error("Invalid price: {0} (must be greater than 0)")]
    InvalidPrice(i64),

    /// Persisted bed counts are out of bounds.
    #[error("Corrupt bed counts for room {room_id}: {bed_remaining} of {capacity} remaining")]
    CorruptBedCount {
        room_id: RoomId,
        capacity: u32,
        bed_remaining: u32,
    },
}

/// Input for adding a room to the inventory.
#[derive(Debug, Clone)]
pub struct NewRoom {
    pub room_number: String,
    pub room_type: RoomType,
    pub price_per_night: Money,
    pub capacity: u32,
}

/// A room and its bed inventory.
///
/// `bed_remaining` is the only mutable counter; availability and status are
/// re-derived from it on every mutation, so they can never drift apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: RoomId,
    room_number: String,
    room_type: RoomType,
    price_per_night: Money,
    capacity: u32,
    bed_remaining: u32,
    is_available: bool,
    status: RoomStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Room {
    /// Creates an empty room with every bed free.
    pub fn new(input: NewRoom, now: DateTime<Utc>) -> Result<Self, RoomError> {
        let room_number = input.room_number.trim().to_string();
        if room_number.is_empty() {
            return Err(RoomError::RoomNumberRequired);
        }
        if input.capacity == 0 {
            return Err(RoomError::InvalidBedCount(0));
        }
        if !input.price_per_night.is_positive() {
            return Err(RoomError::InvalidPrice(input.price_per_night.cents()));
        }

        let mut room = Self {
            id: RoomId::new(),
            room_number,
            room_type: input.room_type,
            price_per_night: input.price_per_night,
            capacity: input.capacity,
            bed_remaining: input.capacity,
            is_available: true,
            status: RoomStatus::Available,
            created_at: now,
            updated_at: now,
        };
        room.refresh();
        Ok(room)
    }

    /// Rebuilds a room from persisted columns, re-deriving availability.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: RoomId,
        room_number: String,
        room_type: RoomType,
        price_per_night: Money,
        capacity: u32,
        bed_remaining: u32,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, RoomError> {
        if bed_remaining > capacity {
            return Err(RoomError::CorruptBedCount {
                room_id: id,
                capacity,
                bed_remaining,
            });
        }
        let mut room = Self {
            id,
            room_number,
            room_type,
            price_per_night,
            capacity,
            bed_remaining,
            is_available: false,
            status: RoomStatus::Available,
            created_at,
            updated_at,
        };
        room.refresh();
        Ok(room)
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn room_number(&self) -> &str {
        &self.room_number
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub fn price_per_night(&self) -> Money {
        self.price_per_night
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn bed_remaining(&self) -> u32 {
        self.bed_remaining
    }

    /// Beds currently held by pending or confirmed bookings.
    pub fn committed_beds(&self) -> u32 {
        self.capacity - self.bed_remaining
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Takes `count` beds out of the free pool.
    ///
    /// Fails without mutating if the room is full or has fewer than `count`
    /// free beds.
    pub fn reserve_beds(&mut self, count: u32, now: DateTime<Utc>) -> Result<(), RoomError> {
        if count == 0 {
            return Err(RoomError::InvalidBedCount(count));
        }
        if self.bed_remaining == 0 {
            return Err(RoomError::Unavailable(self.id));
        }
        if self.bed_remaining < count {
            return Err(RoomError::InsufficientBeds {
                room_id: self.id,
                requested: count,
                remaining: self.bed_remaining,
            });
        }

        self.bed_remaining -= count;
        self.updated_at = now;
        self.refresh();
        Ok(())
    }

    /// Returns `count` beds to the free pool.
    ///
    /// The caller tracks whether a booking's beds were already released; an
    /// over-release is rejected rather than clamped.
    pub fn release_beds(&mut self, count: u32, now: DateTime<Utc>) -> Result<(), RoomError> {
        if count == 0 {
            return Err(RoomError::InvalidBedCount(count));
        }
        if self.bed_remaining + count > self.capacity {
            return Err(RoomError::ReleaseExceedsCapacity {
                room_id: self.id,
                count,
                capacity: self.capacity,
            });
        }

        self.bed_remaining += count;
        self.updated_at = now;
        self.refresh();
        Ok(())
    }

    fn refresh(&mut self) {
        self.is_available = self.bed_remaining > 0;
        self.status = RoomStatus::derive(self.capacity, self.bed_remaining);
    }
}
