//! Domain layer for the hostel booking system.
//!
//! This crate holds the entities and their invariants, with no I/O:
//! - [`Room`] bed inventory with derived availability
//! - [`Resident`] room assignment lifecycle
//! - [`Booking`] status and payment state machines
//! - [`PricingPolicy`] for quoting a stay

pub mod booking;
pub mod error;
pub mod money;
pub mod resident;
pub mod room;

pub use booking::{
    Booking, BookingError, BookingReference, BookingStatus, CaptureDetails, Guests, NewBooking,
    OverlapPolicy, PaymentRecord, PaymentStatus, PriceBreakdown, PricingPolicy, GuestPricing,
    StayDates,
};
pub use error::DomainError;
pub use money::Money;
pub use resident::{NewResident, Resident, ResidentError, ResidentStatus};
pub use room::{NewRoom, Room, RoomError, RoomStatus, RoomType};
