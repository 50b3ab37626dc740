//! Shared identifier types used across the hostel booking crates.

mod types;

pub use types::{BookingId, ResidentId, RoomId, UserId};
