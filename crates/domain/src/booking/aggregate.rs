//! Booking aggregate.

use chrono::{DateTime, Duration, Utc};
use common::{BookingId, ResidentId, RoomId, UserId};
use serde::{Deserialize, Serialize};

use super::{
    BookingError, BookingReference, BookingStatus, Guests, PaymentStatus, PriceBreakdown,
    StayDates,
};
use crate::Money;

/// Input for recording a new booking.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: UserId,
    pub resident_id: ResidentId,
    pub room_id: RoomId,
    pub stay: StayDates,
    pub guests: Guests,
    pub price: PriceBreakdown,
}

/// Payment sub-record of a booking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRecord {
    pub status: PaymentStatus,
    /// Gateway order created for this booking, if any.
    pub order_id: Option<String>,
    pub capture_id: Option<String>,
    pub amount_paid: Option<Money>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_id: Option<String>,
    pub refunded_at: Option<DateTime<Utc>>,
}

/// Result of a settled gateway capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDetails {
    pub capture_id: String,
    pub amount: Money,
    pub captured_at: DateTime<Utc>,
}

/// A booking of beds in one room for one stay.
///
/// Bookings are never deleted; every change is a status transition, so the
/// record doubles as its own audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    id: BookingId,
    reference: BookingReference,
    user_id: UserId,
    resident_id: ResidentId,
    room_id: RoomId,
    #[serde(flatten)]
    stay: StayDates,
    guests: Guests,
    price: PriceBreakdown,
    status: BookingStatus,
    payment: PaymentRecord,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a pending booking.
    pub fn new(input: NewBooking, reference: BookingReference, now: DateTime<Utc>) -> Self {
        Self {
            id: BookingId::new(),
            reference,
            user_id: input.user_id,
            resident_id: input.resident_id,
            room_id: input.room_id,
            stay: input.stay,
            guests: input.guests,
            price: input.price,
            status: BookingStatus::Pending,
            payment: PaymentRecord::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a booking from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: BookingId,
        reference: BookingReference,
        user_id: UserId,
        resident_id: ResidentId,
        room_id: RoomId,
        stay: StayDates,
        guests: Guests,
        price: PriceBreakdown,
        status: BookingStatus,
        payment: PaymentRecord,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            reference,
            user_id,
            resident_id,
            room_id,
            stay,
            guests,
            price,
            status,
            payment,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> BookingId {
        self.id
    }

    pub fn reference(&self) -> &BookingReference {
        &self.reference
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn resident_id(&self) -> ResidentId {
        self.resident_id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn stay(&self) -> &StayDates {
        &self.stay
    }

    pub fn guests(&self) -> &Guests {
        &self.guests
    }

    pub fn price(&self) -> &PriceBreakdown {
        &self.price
    }

    pub fn status(&self) -> BookingStatus {
        self.status
    }

    pub fn payment(&self) -> &PaymentRecord {
        &self.payment
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Beds held in the room while this booking is live.
    pub fn beds(&self) -> u32 {
        self.guests.total()
    }

    pub fn holds_capacity(&self) -> bool {
        self.status.holds_capacity()
    }

    /// Returns true for a pending booking whose payment window has passed.
    pub fn is_stale(&self, now: DateTime<Utc>, payment_window: Duration) -> bool {
        self.status == BookingStatus::Pending && self.created_at + payment_window <= now
    }

    /// Applies a status transition, enforcing the state machine.
    pub fn transition(&mut self, to: BookingStatus, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status == BookingStatus::Cancelled && to == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled);
        }
        if !self.status.can_transition_to(to) {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Records the gateway order opened for this booking.
    pub fn record_order(&mut self, order_id: String, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Confirmed,
            });
        }
        self.payment.order_id = Some(order_id);
        self.updated_at = now;
        Ok(())
    }

    /// Confirms a pending booking with a settled capture.
    pub fn confirm(&mut self, capture: CaptureDetails, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.transition(BookingStatus::Confirmed, now)?;
        self.payment.status = PaymentStatus::Paid;
        self.payment.capture_id = Some(capture.capture_id);
        self.payment.amount_paid = Some(capture.amount);
        self.payment.paid_at = Some(capture.captured_at);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.transition(BookingStatus::Cancelled, now)
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        self.transition(BookingStatus::Completed, now)
    }

    /// Cancels a pending booking whose payment never arrived.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), BookingError> {
        if self.status != BookingStatus::Pending {
            return Err(BookingError::InvalidTransition {
                from: self.status,
                to: BookingStatus::Cancelled,
            });
        }
        self.transition(BookingStatus::Cancelled, now)?;
        self.payment.status = PaymentStatus::Failed;
        Ok(())
    }

    /// Marks the captured payment as refunded.
    ///
    /// Does not touch the booking status; the caller cancels a confirmed
    /// booking separately.
    pub fn mark_refunded(&mut self, refund_id: String, now: DateTime<Utc>) -> Result<(), BookingError> {
        match self.payment.status {
            PaymentStatus::Refunded => return Err(BookingError::AlreadyRefunded),
            PaymentStatus::Paid => {}
            PaymentStatus::Pending | PaymentStatus::Failed => {
                return Err(BookingError::PaymentNotSettled);
            }
        }
        self.payment.status = PaymentStatus::Refunded;
        self.payment.refund_id = Some(refund_id);
        self.payment.refunded_at = Some(now);
        self.updated_at = now;
        Ok(())
    }
}
