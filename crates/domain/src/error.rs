//! Domain error types.

use thiserror::Error;

use crate::booking::BookingError;
use crate::resident::ResidentError;
use crate::room::RoomError;

/// Errors raised by domain invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A room invariant was violated.
    #[error("Room error: {0}")]
    Room(#[from] RoomError),

    /// A resident invariant was violated.
    #[error("Resident error: {0}")]
    Resident(#[from] ResidentError),

    /// A booking invariant was violated.
    #[error("Booking error: {0}")]
    Booking(#[from] BookingError),
}
