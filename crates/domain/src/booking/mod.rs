//! Booking aggregate, its state machines and pricing.

mod aggregate;
mod pricing;
mod state;
mod value_objects;

pub use aggregate::{Booking, CaptureDetails, NewBooking, PaymentRecord};
pub use pricing::{GuestPricing, PriceBreakdown, PricingPolicy};
pub use state::{BookingStatus, PaymentStatus};
pub use value_objects::{BookingReference, Guests, OverlapPolicy, StayDates};

use thiserror::Error;

/// Errors that can occur during booking operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// Dates are unparsable, reversed, or in the past.
    #[error("Invalid dates: {0}")]
    InvalidDates(String),

    /// Guest composition is invalid.
    #[error("Invalid guest count: {0}")]
    InvalidGuestCount(String),

    /// The state machine does not allow this move.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    /// Booking is already cancelled.
    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    /// Payment was already refunded.
    #[error("Payment is already refunded")]
    AlreadyRefunded,

    /// Refund requested for a payment that was never captured.
    #[error("Payment has not been settled")]
    PaymentNotSettled,

    /// Reference is not a well-formed booking reference.
    #[error("Invalid booking reference: {0}")]
    InvalidReference(String),

    /// The quoted price does not fit in a money amount.
    #[error("Price is out of range: {0}")]
    PriceOutOfRange(String),
}
