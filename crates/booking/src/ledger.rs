//! Booking ledger.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{BookingId, RoomId, UserId};
use domain::{
    Booking, BookingReference, BookingStatus, CaptureDetails, Guests, NewBooking, OverlapPolicy,
    PriceBreakdown, Resident, StayDates,
};
use store::{Store, Transaction};

use crate::error::{BookingServiceError, Result};

/// Payment facts recorded against a booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentUpdate {
    /// A gateway order was opened; the payment is still pending.
    OrderCreated(String),
    /// The gateway settled the capture; confirms the booking.
    Captured(CaptureDetails),
    /// The gateway refunded the capture.
    Refunded(String),
}

/// Owns booking records. Bookings are never deleted, only transitioned.
#[derive(Clone)]
pub struct BookingLedger {
    store: Arc<dyn Store>,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Stages a pending booking under a freshly generated reference.
    ///
    /// A reference collision surfaces at commit as a retryable
    /// `DuplicateReference`; the retried operation generates a new one.
    pub fn create(
        &self,
        tx: &mut Transaction<'_>,
        resident: &Resident,
        room_id: RoomId,
        stay: StayDates,
        guests: Guests,
        price: PriceBreakdown,
    ) -> Booking {
        let now = Utc::now();
        let booking = Booking::new(
            NewBooking {
                user_id: resident.user_id(),
                resident_id: resident.id(),
                room_id,
                stay,
                guests,
                price,
            },
            BookingReference::generate(now),
            now,
        );
        tx.insert_booking(booking.clone());
        booking
    }

    pub async fn get(&self, id: BookingId) -> Result<Booking> {
        self.store
            .get_booking(id)
            .await?
            .map(|record| record.into_inner())
            .ok_or_else(|| BookingServiceError::booking_not_found(id))
    }

    pub async fn find_by_reference(&self, reference: &BookingReference) -> Result<Booking> {
        self.store
            .find_booking_by_reference(reference)
            .await?
            .map(|record| record.into_inner())
            .ok_or_else(|| BookingServiceError::BookingNotFound(reference.to_string()))
    }

    pub async fn for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        Ok(self.store.bookings_for_user(user_id).await?)
    }

    /// Loads a booking into the transaction by id.
    pub async fn load(&self, tx: &mut Transaction<'_>, id: BookingId) -> Result<Booking> {
        tx.booking(id)
            .await?
            .ok_or_else(|| BookingServiceError::booking_not_found(id))
    }

    /// Loads a booking into the transaction by reference.
    pub async fn load_by_reference(
        &self,
        tx: &mut Transaction<'_>,
        reference: &BookingReference,
    ) -> Result<Booking> {
        tx.booking_by_reference(reference)
            .await?
            .ok_or_else(|| BookingServiceError::BookingNotFound(reference.to_string()))
    }

    /// First live booking of the resident that clashes with `stay`.
    pub async fn find_overlapping(
        &self,
        tx: &mut Transaction<'_>,
        resident: &Resident,
        stay: &StayDates,
        policy: OverlapPolicy,
    ) -> Result<Option<Booking>> {
        let bookings = tx.bookings_for_resident(resident.id()).await?;
        Ok(bookings
            .into_iter()
            .find(|b| b.holds_capacity() && policy.conflicts(b.stay(), stay)))
    }

    /// Moves a booking through the status state machine.
    pub async fn transition(
        &self,
        tx: &mut Transaction<'_>,
        id: BookingId,
        to: BookingStatus,
    ) -> Result<Booking> {
        let mut booking = self.load(tx, id).await?;
        booking.transition(to, Utc::now())?;
        tx.update_booking(booking.clone())?;
        Ok(booking)
    }

    pub async fn record_payment(
        &self,
        tx: &mut Transaction<'_>,
        id: BookingId,
        update: PaymentUpdate,
    ) -> Result<Booking> {
        let mut booking = self.load(tx, id).await?;
        let now = Utc::now();
        match update {
            PaymentUpdate::OrderCreated(order_id) => booking.record_order(order_id, now)?,
            PaymentUpdate::Captured(capture) => booking.confirm(capture, now)?,
            PaymentUpdate::Refunded(refund_id) => booking.mark_refunded(refund_id, now)?,
        }
        tx.update_booking(booking.clone())?;
        Ok(booking)
    }

    /// Cancels a pending booking whose payment window ran out.
    pub async fn expire(&self, tx: &mut Transaction<'_>, id: BookingId) -> Result<Booking> {
        let mut booking = self.load(tx, id).await?;
        booking.expire(Utc::now())?;
        tx.update_booking(booking.clone())?;
        Ok(booking)
    }

    /// Pending bookings created at least `window` before `now`.
    pub async fn stale_pending(&self, now: DateTime<Utc>, window: Duration) -> Result<Vec<Booking>> {
        let pending = self.store.bookings_by_status(BookingStatus::Pending).await?;
        Ok(pending
            .into_iter()
            .filter(|b| b.is_stale(now, window))
            .collect())
    }
}
