//! Booking orchestrator: the transactional core of the booking lifecycle.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{
    Booking, BookingError, BookingReference, BookingStatus, CaptureDetails, Guests, Money,
    NewResident, NewRoom, PaymentStatus, Resident, ResidentError, Room, StayDates,
};
use serde::{Deserialize, Serialize};
use store::{Store, Transaction};

use crate::config::BookingConfig;
use crate::directory::ResidentDirectory;
use crate::error::{BookingServiceError, Result};
use crate::inventory::RoomInventory;
use crate::ledger::{BookingLedger, PaymentUpdate};
use crate::services::{GatewayError, Notification, Notifier, PaymentGateway, Receipt};

/// Guest counts as supplied by a client, validated into [`Guests`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestCounts {
    pub adults: i64,
    #[serde(default)]
    pub children: i64,
    #[serde(default, rename = "infantsUnder2")]
    pub infants_under_2: i64,
}

/// Request to book beds in a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub room_id: RoomId,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    pub check_in_date: String,
    pub check_out_date: String,
    pub guests: GuestCounts,
}

/// Returned by [`BookingOrchestrator::create_booking`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking_id: BookingId,
    pub booking_reference: BookingReference,
    pub total_price: Money,
    pub currency: String,
    pub status: BookingStatus,
}

impl From<&Booking> for BookingConfirmation {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id(),
            booking_reference: booking.reference().clone(),
            total_price: booking.price().total,
            currency: booking.price().currency.clone(),
            status: booking.status(),
        }
    }
}

/// Gateway order opened for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOrder {
    pub booking_id: BookingId,
    pub order_id: String,
    pub approval_url: Option<String>,
    pub amount: Money,
    pub currency: String,
}

/// Coordinates rooms, residents and bookings.
///
/// Every operation reads through one [`Transaction`] and commits all of its
/// writes at once. A commit that loses an optimistic version check re-runs
/// the operation from a fresh read, so the loser of a race re-validates and
/// sees the winner's outcome. Payment gateway calls happen outside the
/// transaction, are bounded by `gateway_timeout`, and are never retried.
pub struct BookingOrchestrator {
    store: Arc<dyn Store>,
    inventory: RoomInventory,
    directory: ResidentDirectory,
    ledger: BookingLedger,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    config: BookingConfig,
}

impl BookingOrchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        config: BookingConfig,
    ) -> Self {
        Self {
            inventory: RoomInventory::new(store.clone()),
            directory: ResidentDirectory::new(store.clone()),
            ledger: BookingLedger::new(store.clone()),
            store,
            gateway,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &BookingConfig {
        &self.config
    }

    pub async fn add_room(&self, input: NewRoom) -> Result<Room> {
        self.inventory.add_room(input).await
    }

    pub async fn get_room(&self, id: RoomId) -> Result<Room> {
        self.inventory.get_room(id).await
    }

    pub async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        self.inventory.list_rooms(available_only).await
    }

    pub async fn register_resident(&self, input: NewResident) -> Result<Resident> {
        self.directory.register(input).await
    }

    pub async fn get_resident(&self, id: ResidentId) -> Result<Resident> {
        self.directory.get_resident(id).await
    }

    pub async fn get_booking(&self, reference: &str) -> Result<Booking> {
        let reference = BookingReference::parse(reference)?;
        self.ledger.find_by_reference(&reference).await
    }

    pub async fn get_booking_by_id(&self, id: BookingId) -> Result<Booking> {
        self.ledger.get(id).await
    }

    pub async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        self.ledger.for_user(user_id).await
    }

    /// Books beds for the user's resident profile.
    ///
    /// Validates dates and guests, then in one transaction reserves one bed
    /// per guest and records a pending booking. Nothing is written unless
    /// every step succeeds.
    #[tracing::instrument(skip(self, request), fields(room_id = %request.room_id))]
    pub async fn create_booking(
        &self,
        user_id: UserId,
        request: CreateBookingRequest,
    ) -> Result<BookingConfirmation> {
        let start = Instant::now();
        let today = Utc::now().date_naive();
        let stay = StayDates::parse(&request.check_in_date, &request.check_out_date, today)?;
        let counts = request.guests;
        let guests = Guests::from_counts(counts.adults, counts.children, counts.infants_under_2)?;
        let room_id = request.room_id;

        let (booking, resident) = self
            .with_retry(move || self.try_create_booking(user_id, room_id, stay, guests))
            .await?;

        metrics::counter!("bookings_created_total").increment(1);
        tracing::info!(
            booking_id = %booking.id(),
            reference = %booking.reference(),
            beds = booking.beds(),
            total = %booking.price().total,
            "booking created"
        );

        self.deliver(Notification {
            to: resident.email().to_string(),
            subject: format!("Booking {} received", booking.reference()),
            body: format!(
                "Hi {}, your booking {} from {} to {} is reserved. Total due: {} {}.",
                resident.name(),
                booking.reference(),
                booking.stay().check_in(),
                booking.stay().check_out(),
                booking.price().total.to_decimal_string(),
                booking.price().currency,
            ),
            receipt: None,
        })
        .await;

        record_duration("create_booking", start);
        Ok(BookingConfirmation::from(&booking))
    }

    async fn try_create_booking(
        &self,
        user_id: UserId,
        room_id: RoomId,
        stay: StayDates,
        guests: Guests,
    ) -> Result<(Booking, Resident)> {
        let mut tx = Transaction::begin(self.store.as_ref());

        let resident = self.directory.resident_for_user(&mut tx, user_id).await?;
        if let Some(current) = resident.room_id() {
            return Err(ResidentError::AlreadyAssigned {
                resident_id: resident.id(),
                room_id: current,
            }
            .into());
        }
        if let Some(existing) = self
            .ledger
            .find_overlapping(&mut tx, &resident, &stay, self.config.overlap)
            .await?
        {
            return Err(BookingServiceError::OverlappingBooking {
                reference: existing.reference().to_string(),
            });
        }

        let room = self
            .inventory
            .reserve_beds(&mut tx, room_id, guests.total())
            .await?;
        let price = self
            .config
            .pricing
            .quote(room.price_per_night(), &stay, &guests)?;
        let booking = self
            .ledger
            .create(&mut tx, &resident, room.id(), stay, guests, price);

        // Staging the resident makes concurrent bookings by the same resident
        // conflict at commit, so the overlap check above cannot be raced.
        tx.update_resident(resident.clone())?;

        tx.commit().await?;
        Ok((booking, resident))
    }

    /// Opens a gateway order for a pending booking and records its id.
    #[tracing::instrument(skip(self))]
    pub async fn create_payment_order(&self, booking_id: BookingId) -> Result<PaymentOrder> {
        let start = Instant::now();
        let booking = self.ledger.get(booking_id).await?;
        ensure_pending(&booking)?;

        let price = booking.price();
        let order = self
            .call_gateway(
                self.gateway
                    .create_order(price.total, &price.currency, booking.reference()),
            )
            .await?;

        let order_id = order.order_id.as_str();
        self.with_retry(move || self.try_record_order(booking_id, order_id))
            .await?;

        tracing::info!(order_id = %order.order_id, "payment order created");
        record_duration("create_payment_order", start);
        Ok(PaymentOrder {
            booking_id,
            order_id: order.order_id,
            approval_url: order.approval_url,
            amount: price.total,
            currency: price.currency.clone(),
        })
    }

    async fn try_record_order(&self, booking_id: BookingId, order_id: &str) -> Result<()> {
        let mut tx = Transaction::begin(self.store.as_ref());
        self.ledger
            .record_payment(
                &mut tx,
                booking_id,
                PaymentUpdate::OrderCreated(order_id.to_string()),
            )
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Captures the gateway order and confirms the booking.
    ///
    /// The order must be the one recorded by `create_payment_order`, and the
    /// resident must not already hold a room; both are checked before the
    /// gateway is called. A capture the gateway does not report as completed
    /// fails with `PaymentNotCompleted` and changes nothing, as does a capture
    /// whose amount differs from the booking total. After a settled capture
    /// the booking is confirmed and the resident assigned to the room in one
    /// transaction; the receipt goes out after commit.
    #[tracing::instrument(skip(self))]
    pub async fn capture_payment(&self, booking_id: BookingId, order_id: &str) -> Result<Booking> {
        let start = Instant::now();
        let booking = self.ledger.get(booking_id).await?;
        ensure_pending(&booking)?;
        let Some(expected) = booking.payment().order_id.as_deref() else {
            return Err(BookingServiceError::NoPaymentOrder(
                booking.reference().to_string(),
            ));
        };
        if expected != order_id {
            return Err(BookingServiceError::OrderMismatch {
                expected: expected.to_string(),
                actual: order_id.to_string(),
            });
        }
        let resident = self.directory.get_resident(booking.resident_id()).await?;
        if let Some(current) = resident.room_id() {
            return Err(ResidentError::AlreadyAssigned {
                resident_id: resident.id(),
                room_id: current,
            }
            .into());
        }

        let captured = match self
            .call_gateway(self.gateway.capture_order(order_id))
            .await
        {
            Ok(captured) => captured,
            Err(err) => {
                metrics::counter!("payment_capture_failures_total").increment(1);
                tracing::warn!(error = %err, "payment capture failed");
                return Err(err.into());
            }
        };
        if !captured.status.is_settled() {
            metrics::counter!("payment_capture_failures_total").increment(1);
            tracing::warn!(status = %captured.status, "capture not completed");
            return Err(BookingServiceError::PaymentNotCompleted {
                status: captured.status.to_string(),
            });
        }

        let expected = booking.price().total;
        let amount = captured.amount.unwrap_or(expected);
        if amount != expected {
            metrics::counter!("payment_capture_failures_total").increment(1);
            tracing::error!(
                capture_id = %captured.capture_id,
                %amount,
                %expected,
                "captured amount differs from booking total"
            );
            return Err(BookingServiceError::AmountMismatch {
                expected,
                captured: amount,
            });
        }
        let details = CaptureDetails {
            capture_id: captured.capture_id,
            amount,
            captured_at: Utc::now(),
        };

        let details = &details;
        let (booking, resident) = self
            .with_retry(move || self.try_confirm(booking_id, details))
            .await
            .inspect_err(|err| {
                tracing::error!(
                    capture_id = %details.capture_id,
                    error = %err,
                    "payment captured but booking not confirmed"
                );
            })?;

        metrics::counter!("payments_captured_total").increment(1);
        tracing::info!(
            reference = %booking.reference(),
            capture_id = %details.capture_id,
            "booking confirmed"
        );

        let receipt = Receipt::for_booking(&booking, resident.name());
        self.deliver(Notification {
            to: resident.email().to_string(),
            subject: format!("Payment receipt for booking {}", booking.reference()),
            body: receipt.render(),
            receipt: Some(receipt),
        })
        .await;

        record_duration("capture_payment", start);
        Ok(booking)
    }

    async fn try_confirm(
        &self,
        booking_id: BookingId,
        details: &CaptureDetails,
    ) -> Result<(Booking, Resident)> {
        let mut tx = Transaction::begin(self.store.as_ref());
        let booking = self
            .ledger
            .record_payment(&mut tx, booking_id, PaymentUpdate::Captured(details.clone()))
            .await?;
        let resident = self
            .directory
            .assign_room(
                &mut tx,
                booking.resident_id(),
                booking.room_id(),
                booking.stay().check_in(),
                booking.stay().check_out(),
            )
            .await?;
        tx.commit().await?;
        Ok((booking, resident))
    }

    /// Cancels a booking and returns its beds to the room.
    ///
    /// Cancelling an already cancelled booking fails with `AlreadyCancelled`
    /// and releases nothing.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_booking(&self, reference: &str) -> Result<Booking> {
        let start = Instant::now();
        let reference = BookingReference::parse(reference)?;
        let reference = &reference;

        let (booking, resident) = self
            .with_retry(move || self.try_cancel(reference))
            .await?;

        metrics::counter!("bookings_cancelled_total").increment(1);
        tracing::info!(beds = booking.beds(), "booking cancelled");

        self.deliver(Notification {
            to: resident.email().to_string(),
            subject: format!("Booking {} cancelled", booking.reference()),
            body: format!(
                "Hi {}, your booking {} has been cancelled.",
                resident.name(),
                booking.reference()
            ),
            receipt: None,
        })
        .await;

        record_duration("cancel_booking", start);
        Ok(booking)
    }

    async fn try_cancel(&self, reference: &BookingReference) -> Result<(Booking, Resident)> {
        let mut tx = Transaction::begin(self.store.as_ref());
        let current = self.ledger.load_by_reference(&mut tx, reference).await?;
        let booking = self.cancel_in(&mut tx, current).await?;
        let resident = self.load_resident(&mut tx, booking.resident_id()).await?;
        tx.commit().await?;
        Ok((booking, resident))
    }

    /// Refunds the captured payment of a booking.
    ///
    /// The gateway refund runs first; only after it succeeds does one
    /// transaction mark the payment refunded and, for a confirmed booking,
    /// cancel it and release its beds.
    #[tracing::instrument(skip(self))]
    pub async fn refund_booking(&self, reference: &str) -> Result<Booking> {
        let start = Instant::now();
        let reference = BookingReference::parse(reference)?;
        let booking = self.ledger.find_by_reference(&reference).await?;

        match booking.payment().status {
            PaymentStatus::Paid => {}
            PaymentStatus::Refunded => return Err(BookingError::AlreadyRefunded.into()),
            PaymentStatus::Pending | PaymentStatus::Failed => {
                return Err(BookingError::PaymentNotSettled.into());
            }
        }
        self.check_refund_policy(&booking, Utc::now())?;

        let payment = booking.payment();
        let capture_id = payment
            .capture_id
            .as_deref()
            .ok_or(BookingError::PaymentNotSettled)?;
        let amount = payment.amount_paid.unwrap_or(booking.price().total);
        let refund = self
            .call_gateway(
                self.gateway
                    .refund(capture_id, amount, &booking.price().currency),
            )
            .await?;

        let reference = &reference;
        let refund_id = refund.refund_id.as_str();
        let booking = self
            .with_retry(move || self.try_refund(reference, refund_id))
            .await
            .inspect_err(|err| {
                tracing::error!(
                    refund_id = %refund_id,
                    error = %err,
                    "payment refunded but booking not updated"
                );
            })?;

        metrics::counter!("payments_refunded_total").increment(1);
        tracing::info!(
            refund_id = %refund.refund_id,
            status = %refund.status,
            %amount,
            "payment refunded"
        );
        record_duration("refund_booking", start);
        Ok(booking)
    }

    async fn try_refund(&self, reference: &BookingReference, refund_id: &str) -> Result<Booking> {
        let mut tx = Transaction::begin(self.store.as_ref());
        let current = self.ledger.load_by_reference(&mut tx, reference).await?;
        let was_confirmed = current.status() == BookingStatus::Confirmed;

        let mut booking = self
            .ledger
            .record_payment(
                &mut tx,
                current.id(),
                PaymentUpdate::Refunded(refund_id.to_string()),
            )
            .await?;
        if was_confirmed {
            booking = self.cancel_in(&mut tx, booking).await?;
        }

        tx.commit().await?;
        Ok(booking)
    }

    fn check_refund_policy(&self, booking: &Booking, now: DateTime<Utc>) -> Result<()> {
        let policy = &self.config.refund;
        if !policy.enabled {
            return Err(BookingServiceError::RefundNotAllowed(
                "refunds are disabled".to_string(),
            ));
        }
        match booking.status() {
            BookingStatus::Completed => Err(BookingServiceError::RefundNotAllowed(
                "stay is already completed".to_string(),
            )),
            BookingStatus::Confirmed => {
                let days = (booking.stay().check_in() - now.date_naive()).num_days();
                if days < policy.min_days_before_check_in {
                    Err(BookingServiceError::RefundNotAllowed(format!(
                        "check-in is {days} day(s) away, at least {} required",
                        policy.min_days_before_check_in
                    )))
                } else {
                    Ok(())
                }
            }
            BookingStatus::Pending | BookingStatus::Cancelled => Ok(()),
        }
    }

    /// Completes a confirmed stay: releases the beds and checks the resident
    /// out.
    #[tracing::instrument(skip(self))]
    pub async fn complete_stay(&self, reference: &str) -> Result<Booking> {
        let start = Instant::now();
        let reference = BookingReference::parse(reference)?;
        let reference = &reference;

        let booking = self
            .with_retry(move || self.try_complete(reference))
            .await?;

        tracing::info!(beds = booking.beds(), "stay completed");
        record_duration("complete_stay", start);
        Ok(booking)
    }

    async fn try_complete(&self, reference: &BookingReference) -> Result<Booking> {
        let mut tx = Transaction::begin(self.store.as_ref());
        let current = self.ledger.load_by_reference(&mut tx, reference).await?;
        let booking = self
            .ledger
            .transition(&mut tx, current.id(), BookingStatus::Completed)
            .await?;
        self.inventory
            .release_beds(&mut tx, booking.room_id(), booking.beds())
            .await?;
        self.release_assignment(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(booking)
    }

    /// Cancels pending bookings whose payment window has passed and returns
    /// how many were expired.
    ///
    /// A booking confirmed or cancelled meanwhile is skipped. A failure on
    /// one booking is logged and does not stop the sweep.
    #[tracing::instrument(skip(self))]
    pub async fn expire_pending(&self, now: DateTime<Utc>) -> Result<usize> {
        let start = Instant::now();
        let stale = self
            .ledger
            .stale_pending(now, self.config.payment_window)
            .await?;

        let mut expired = 0;
        for booking in stale {
            let id = booking.id();
            match self.with_retry(move || self.try_expire(id, now)).await {
                Ok(true) => {
                    expired += 1;
                    metrics::counter!("bookings_expired_total").increment(1);
                    tracing::info!(reference = %booking.reference(), "pending booking expired");
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(
                        reference = %booking.reference(),
                        error = %err,
                        "failed to expire booking"
                    );
                }
            }
        }

        record_duration("expire_pending", start);
        Ok(expired)
    }

    async fn try_expire(&self, id: BookingId, now: DateTime<Utc>) -> Result<bool> {
        let mut tx = Transaction::begin(self.store.as_ref());
        let current = self.ledger.load(&mut tx, id).await?;
        if !current.is_stale(now, self.config.payment_window) {
            return Ok(false);
        }
        let booking = self.ledger.expire(&mut tx, id).await?;
        self.inventory
            .release_beds(&mut tx, booking.room_id(), booking.beds())
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Stages the cancellation of a loaded booking: status change, bed
    /// release and, if the booking had been confirmed, the resident's
    /// assignment.
    async fn cancel_in(&self, tx: &mut Transaction<'_>, current: Booking) -> Result<Booking> {
        let was_confirmed = current.status() == BookingStatus::Confirmed;
        let booking = self
            .ledger
            .transition(tx, current.id(), BookingStatus::Cancelled)
            .await?;
        self.inventory
            .release_beds(tx, booking.room_id(), booking.beds())
            .await?;
        if was_confirmed {
            self.release_assignment(tx, &booking).await?;
        }
        Ok(booking)
    }

    /// Clears the resident's room if it is the one this booking assigned.
    async fn release_assignment(&self, tx: &mut Transaction<'_>, booking: &Booking) -> Result<()> {
        let resident = self.load_resident(tx, booking.resident_id()).await?;
        if resident.room_id() == Some(booking.room_id()) {
            self.directory
                .clear_assignment(tx, booking.resident_id())
                .await?;
        }
        Ok(())
    }

    async fn load_resident(&self, tx: &mut Transaction<'_>, id: ResidentId) -> Result<Resident> {
        tx.resident(id)
            .await?
            .ok_or(BookingServiceError::ResidentNotFound(id))
    }

    /// Runs `attempt` until it succeeds, fails with a non-retryable error, or
    /// `max_commit_attempts` is used up.
    async fn with_retry<T, F, Fut>(&self, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut tries = 1;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && tries < max_attempts => {
                    tracing::debug!(attempt = tries, error = %err, "commit conflict, retrying");
                    tries += 1;
                }
                result => return result,
            }
        }
    }

    async fn call_gateway<T>(
        &self,
        call: impl Future<Output = std::result::Result<T, GatewayError>>,
    ) -> std::result::Result<T, GatewayError> {
        let timeout = self.config.gateway_timeout;
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| GatewayError::Timeout(timeout))?
    }

    /// Sends a notification after commit. Failures are logged and dropped.
    async fn deliver(&self, notification: Notification) {
        let to = notification.to.clone();
        let timeout = self.config.gateway_timeout;
        let outcome = tokio::time::timeout(timeout, self.notifier.notify(notification)).await;
        let error = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("timed out after {timeout:?}"),
        };
        metrics::counter!("notification_failures_total").increment(1);
        tracing::warn!(%to, %error, "notification not delivered");
    }
}

fn ensure_pending(booking: &Booking) -> Result<()> {
    match booking.status() {
        BookingStatus::Pending => Ok(()),
        from => Err(BookingError::InvalidTransition {
            from,
            to: BookingStatus::Confirmed,
        }
        .into()),
    }
}

fn record_duration(operation: &'static str, start: Instant) {
    metrics::histogram!("booking_operation_duration_seconds", "operation" => operation)
        .record(start.elapsed().as_secs_f64());
}
