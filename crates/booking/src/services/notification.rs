//! Notification delivery.
//!
//! Delivery is best effort: the orchestrator sends after commit and only logs
//! failures.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Booking, Money};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotificationError {
    #[error("Notification delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Payment receipt attached to a confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub booking_reference: String,
    pub resident_name: String,
    pub capture_id: String,
    pub nights: u32,
    pub room_cost: Money,
    pub service_charge: Money,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
    pub paid_at: DateTime<Utc>,
}

impl Receipt {
    pub fn for_booking(booking: &Booking, resident_name: &str) -> Self {
        let payment = booking.payment();
        let price = booking.price();
        Self {
            booking_reference: booking.reference().to_string(),
            resident_name: resident_name.to_string(),
            capture_id: payment.capture_id.clone().unwrap_or_default(),
            nights: price.nights,
            room_cost: price.base_cost,
            service_charge: price.service_charge,
            tax: price.tax,
            total: payment.amount_paid.unwrap_or(price.total),
            currency: price.currency.clone(),
            paid_at: payment.paid_at.unwrap_or_else(Utc::now),
        }
    }

    /// Plain-text rendering used as the attachment body.
    pub fn render(&self) -> String {
        format!(
            "Payment receipt\n\
             Booking: {}\n\
             Guest: {}\n\
             Transaction: {}\n\
             Nights: {}\n\
             Room cost: {} {}\n\
             Service charge: {} {}\n\
             Tax: {} {}\n\
             Total paid: {} {}\n\
             Paid at: {}\n",
            self.booking_reference,
            self.resident_name,
            self.capture_id,
            self.nights,
            self.room_cost.to_decimal_string(),
            self.currency,
            self.service_charge.to_decimal_string(),
            self.currency,
            self.tax.to_decimal_string(),
            self.currency,
            self.total.to_decimal_string(),
            self.currency,
            self.paid_at.format("%Y-%m-%d %H:%M:%S UTC"),
        )
    }
}

/// A message for a resident.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub receipt: Option<Receipt>,
}

/// Trait for the notification collaborator (email, SMS, ...).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Notifier that only writes the notification to the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        tracing::info!(
            to = %notification.to,
            subject = %notification.subject,
            has_receipt = notification.receipt.is_some(),
            "notification sent"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<Notification>,
    fail: bool,
}

/// In-memory notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<RwLock<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later delivery fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.write().unwrap_or_else(PoisonError::into_inner).fail = fail;
    }

    /// Notifications delivered so far.
    pub fn sent(&self) -> Vec<Notification> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .sent
            .clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), NotificationError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.fail {
            return Err(NotificationError::DeliveryFailed(
                "mailbox unavailable".to_string(),
            ));
        }
        state.sent.push(notification);
        Ok(())
    }
}
