use async_trait::async_trait;
use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{Booking, BookingReference, BookingStatus, Resident, Room};

use crate::{ChangeSet, Result, Versioned};

/// Core trait for store implementations.
///
/// Reads are point-in-time; writes only happen through [`Store::commit`].
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_room(&self, id: RoomId) -> Result<Option<Versioned<Room>>>;

    /// Lists rooms ordered by room number.
    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>>;

    async fn get_resident(&self, id: ResidentId) -> Result<Option<Versioned<Resident>>>;

    async fn find_resident_by_user(&self, user_id: UserId) -> Result<Option<Versioned<Resident>>>;

    async fn get_booking(&self, id: BookingId) -> Result<Option<Versioned<Booking>>>;

    async fn find_booking_by_reference(
        &self,
        reference: &BookingReference,
    ) -> Result<Option<Versioned<Booking>>>;

    /// Bookings of one resident, oldest first.
    async fn bookings_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Booking>>;

    /// Bookings made by one user account, oldest first.
    async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>>;

    /// Bookings in the given status, oldest first.
    async fn bookings_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>>;

    /// Applies every change atomically.
    ///
    /// Fails with `ConcurrencyConflict` if any updated record is no longer at
    /// its expected version, or with a `Duplicate*` error if a unique key is
    /// taken; in both cases nothing is written.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}
