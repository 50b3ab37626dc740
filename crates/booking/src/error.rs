//! Booking service error types.

use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{BookingError, DomainError, Money, ResidentError, RoomError};
use store::StoreError;
use thiserror::Error;

use crate::services::GatewayError;

/// Coarse classification of a failure, used to pick the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Gateway,
    Internal,
}

/// Errors that can occur during booking operations.
#[derive(Debug, Error)]
pub enum BookingServiceError {
    /// A domain invariant rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Room not found: {0}")]
    RoomNotFound(RoomId),

    #[error("Resident not found: {0}")]
    ResidentNotFound(ResidentId),

    /// The user has no resident profile to book with.
    #[error("No resident profile for user {0}")]
    NoResidentProfile(UserId),

    /// A user already has a resident profile.
    #[error("User {0} already has a resident profile")]
    ResidentAlreadyRegistered(UserId),

    #[error("Room number {0} already exists")]
    DuplicateRoomNumber(String),

    #[error("Booking not found: {0}")]
    BookingNotFound(String),

    /// The resident already holds a live booking for overlapping dates.
    #[error("Overlapping booking {reference} already exists")]
    OverlappingBooking { reference: String },

    /// The gateway did not settle the capture.
    #[error("Payment not completed: gateway reported {status}")]
    PaymentNotCompleted { status: String },

    /// The order id does not belong to the booking.
    #[error("Order {actual} does not match booking order {expected}")]
    OrderMismatch { expected: String, actual: String },

    /// Capture attempted before a payment order was created for the booking.
    #[error("No payment order has been created for booking {0}")]
    NoPaymentOrder(String),

    /// The gateway captured a different amount than the booking total.
    #[error("Captured amount {captured} does not match booking total {expected}")]
    AmountMismatch { expected: Money, captured: Money },

    /// Refund rejected by the refund policy.
    #[error("Refund not allowed: {0}")]
    RefundNotAllowed(String),

    #[error("Payment gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl BookingServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BookingServiceError::Domain(err) => domain_kind(err),
            BookingServiceError::RoomNotFound(_)
            | BookingServiceError::ResidentNotFound(_)
            | BookingServiceError::NoResidentProfile(_)
            | BookingServiceError::BookingNotFound(_) => ErrorKind::NotFound,
            BookingServiceError::ResidentAlreadyRegistered(_)
            | BookingServiceError::DuplicateRoomNumber(_)
            | BookingServiceError::OverlappingBooking { .. }
            | BookingServiceError::NoPaymentOrder(_)
            | BookingServiceError::RefundNotAllowed(_) => ErrorKind::Conflict,
            BookingServiceError::OrderMismatch { .. } => ErrorKind::Validation,
            BookingServiceError::PaymentNotCompleted { .. }
            | BookingServiceError::AmountMismatch { .. }
            | BookingServiceError::Gateway(_) => ErrorKind::Gateway,
            BookingServiceError::Store(StoreError::ConcurrencyConflict { .. }) => {
                ErrorKind::Conflict
            }
            BookingServiceError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Returns true if re-running the whole operation from a fresh read may
    /// succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BookingServiceError::Store(err) if err.is_retryable())
    }
}

fn domain_kind(err: &DomainError) -> ErrorKind {
    match err {
        DomainError::Room(RoomError::Unavailable(_) | RoomError::InsufficientBeds { .. }) => {
            ErrorKind::Conflict
        }
        DomainError::Room(
            RoomError::ReleaseExceedsCapacity { .. } | RoomError::CorruptBedCount { .. },
        ) => ErrorKind::Internal,
        DomainError::Room(_) => ErrorKind::Validation,
        DomainError::Resident(ResidentError::AlreadyAssigned { .. }) => ErrorKind::Conflict,
        DomainError::Resident(_) => ErrorKind::Validation,
        DomainError::Booking(
            BookingError::InvalidDates(_)
            | BookingError::InvalidGuestCount(_)
            | BookingError::InvalidReference(_)
            | BookingError::PriceOutOfRange(_),
        ) => ErrorKind::Validation,
        DomainError::Booking(_) => ErrorKind::Conflict,
    }
}

impl From<StoreError> for BookingServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateRoomNumber(number) => {
                BookingServiceError::DuplicateRoomNumber(number)
            }
            StoreError::DuplicateResident(user_id) => {
                BookingServiceError::ResidentAlreadyRegistered(user_id)
            }
            other => BookingServiceError::Store(other),
        }
    }
}

impl From<RoomError> for BookingServiceError {
    fn from(err: RoomError) -> Self {
        BookingServiceError::Domain(err.into())
    }
}

impl From<ResidentError> for BookingServiceError {
    fn from(err: ResidentError) -> Self {
        BookingServiceError::Domain(err.into())
    }
}

impl From<BookingError> for BookingServiceError {
    fn from(err: BookingError) -> Self {
        BookingServiceError::Domain(err.into())
    }
}

impl BookingServiceError {
    pub(crate) fn booking_not_found(id: BookingId) -> Self {
        BookingServiceError::BookingNotFound(id.to_string())
    }
}

/// Convenience type alias for booking results.
pub type Result<T> = std::result::Result<T, BookingServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let room = RoomId::new();
        assert_eq!(
            BookingServiceError::from(RoomError::Unavailable(room)).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BookingServiceError::from(RoomError::InvalidBedCount(0)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BookingServiceError::from(BookingError::InvalidDates("past".into())).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BookingServiceError::from(BookingError::AlreadyCancelled).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BookingServiceError::RoomNotFound(room).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            BookingServiceError::from(GatewayError::Unavailable("down".into())).kind(),
            ErrorKind::Gateway
        );
        assert_eq!(
            BookingServiceError::from(StoreError::Corrupt("bad row".into())).kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            BookingServiceError::from(BookingError::PriceOutOfRange("3 nights".into())).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BookingServiceError::NoPaymentOrder("BK-1".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            BookingServiceError::AmountMismatch {
                expected: Money::from_major(354),
                captured: Money::from_cents(118),
            }
            .kind(),
            ErrorKind::Gateway
        );
    }

    #[test]
    fn test_store_duplicates_are_lifted() {
        let err = BookingServiceError::from(StoreError::DuplicateRoomNumber("101".into()));
        assert!(matches!(err, BookingServiceError::DuplicateRoomNumber(ref n) if n == "101"));
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let user = UserId::new();
        let err = BookingServiceError::from(StoreError::DuplicateResident(user));
        assert!(matches!(err, BookingServiceError::ResidentAlreadyRegistered(u) if u == user));
    }

    #[test]
    fn test_retryable() {
        let conflict = BookingServiceError::from(StoreError::DuplicateReference("BK-1".into()));
        assert!(conflict.is_retryable());
        assert!(!BookingServiceError::from(BookingError::AlreadyCancelled).is_retryable());
    }
}
