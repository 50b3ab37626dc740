//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{BookingReference, Money};
use thiserror::Error;

/// Errors reported by a payment gateway.
///
/// None of these leave local state changed; the caller surfaces them and the
/// client may retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// The payer has not approved the order yet.
    #[error("Order {0} has not been approved")]
    NotApproved(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Capture {0} is already refunded")]
    AlreadyRefunded(String),

    /// The gateway answered with something we cannot interpret.
    #[error("Unexpected gateway response: {0}")]
    UnexpectedResponse(String),
}

/// Order opened with the gateway; the payer approves it at `approval_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedOrder {
    pub order_id: String,
    pub approval_url: Option<String>,
}

/// Status the gateway reports for a capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Completed,
    Pending,
    Declined,
    Other(String),
}

impl CaptureStatus {
    /// Maps a provider status string such as `COMPLETED`.
    pub fn from_provider(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "COMPLETED" => CaptureStatus::Completed,
            "PENDING" => CaptureStatus::Pending,
            "DECLINED" | "FAILED" => CaptureStatus::Declined,
            _ => CaptureStatus::Other(status.to_string()),
        }
    }

    /// Only a completed capture counts as settled money.
    pub fn is_settled(&self) -> bool {
        matches!(self, CaptureStatus::Completed)
    }
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Completed => write!(f, "COMPLETED"),
            CaptureStatus::Pending => write!(f, "PENDING"),
            CaptureStatus::Declined => write!(f, "DECLINED"),
            CaptureStatus::Other(status) => write!(f, "{status}"),
        }
    }
}

/// Result of a capture call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOrder {
    pub capture_id: String,
    pub status: CaptureStatus,
    /// Amount reported as captured, when the gateway includes it.
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundResult {
    pub refund_id: String,
    pub status: String,
}

/// Trait for an external payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens an order for `amount` tagged with the booking reference.
    async fn create_order(
        &self,
        amount: Money,
        currency: &str,
        reference: &BookingReference,
    ) -> Result<CreatedOrder, GatewayError>;

    /// Captures an approved order. Callers must check
    /// [`CaptureStatus::is_settled`] before treating the payment as paid.
    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder, GatewayError>;

    /// Refunds a settled capture.
    async fn refund(
        &self,
        capture_id: &str,
        amount: Money,
        currency: &str,
    ) -> Result<RefundResult, GatewayError>;
}

#[derive(Debug, Clone)]
struct OrderRecord {
    amount: Money,
    reference: String,
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    orders: HashMap<String, OrderRecord>,
    /// Capture id to refunded flag.
    captures: HashMap<String, bool>,
    next_id: u32,
    fail_on_create: bool,
    fail_on_capture: bool,
    fail_on_refund: bool,
    capture_status: Option<CaptureStatus>,
    delay: Option<Duration>,
    capture_calls: u32,
    refund_calls: u32,
}

/// In-memory payment gateway for testing and local runs.
///
/// Orders are approved as soon as they exist; the capture status can be
/// scripted with [`InMemoryPaymentGateway::set_capture_status`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_create(&self, fail: bool) {
        self.write().fail_on_create = fail;
    }

    pub fn set_fail_on_capture(&self, fail: bool) {
        self.write().fail_on_capture = fail;
    }

    pub fn set_fail_on_refund(&self, fail: bool) {
        self.write().fail_on_refund = fail;
    }

    /// Status reported by subsequent captures; `None` restores `COMPLETED`.
    pub fn set_capture_status(&self, status: Option<CaptureStatus>) {
        self.write().capture_status = status;
    }

    /// Delays every call, to exercise caller timeouts.
    pub fn set_delay(&self, delay: Option<Duration>) {
        self.write().delay = delay;
    }

    /// Opens an order directly, as if a client created it elsewhere.
    pub fn seed_order(&self, order_id: &str, amount: Money) {
        self.write().orders.insert(
            order_id.to_string(),
            OrderRecord {
                amount,
                reference: String::new(),
            },
        );
    }

    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    pub fn capture_calls(&self) -> u32 {
        self.read().capture_calls
    }

    pub fn refund_calls(&self) -> u32 {
        self.read().refund_calls
    }

    /// Booking reference an order was opened for.
    pub fn order_reference(&self, order_id: &str) -> Option<String> {
        self.read()
            .orders
            .get(order_id)
            .map(|order| order.reference.clone())
    }

    async fn pause(&self) {
        let delay = self.read().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, InMemoryGatewayState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, InMemoryGatewayState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_order(
        &self,
        amount: Money,
        _currency: &str,
        reference: &BookingReference,
    ) -> Result<CreatedOrder, GatewayError> {
        self.pause().await;
        let mut state = self.write();

        if state.fail_on_create {
            return Err(GatewayError::Unavailable("order creation refused".to_string()));
        }
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(amount));
        }

        state.next_id += 1;
        let order_id = format!("ORDER-{:04}", state.next_id);
        state.orders.insert(
            order_id.clone(),
            OrderRecord {
                amount,
                reference: reference.to_string(),
            },
        );

        Ok(CreatedOrder {
            approval_url: Some(format!("https://payments.test/approve/{order_id}")),
            order_id,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CapturedOrder, GatewayError> {
        self.pause().await;
        let mut state = self.write();
        state.capture_calls += 1;

        if state.fail_on_capture {
            return Err(GatewayError::CaptureFailed("capture declined".to_string()));
        }
        let Some(order) = state.orders.get(order_id).cloned() else {
            return Err(GatewayError::NotApproved(order_id.to_string()));
        };

        let status = state.capture_status.clone().unwrap_or(CaptureStatus::Completed);
        state.next_id += 1;
        let capture_id = format!("CAPTURE-{:04}", state.next_id);
        if status.is_settled() {
            state.captures.insert(capture_id.clone(), false);
        }

        Ok(CapturedOrder {
            capture_id,
            status,
            amount: Some(order.amount),
        })
    }

    async fn refund(
        &self,
        capture_id: &str,
        amount: Money,
        _currency: &str,
    ) -> Result<RefundResult, GatewayError> {
        self.pause().await;
        let mut state = self.write();
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(GatewayError::RefundFailed("refund refused".to_string()));
        }
        if !amount.is_positive() {
            return Err(GatewayError::InvalidAmount(amount));
        }
        match state.captures.get(capture_id).copied() {
            None => {
                return Err(GatewayError::RefundFailed(format!(
                    "unknown capture {capture_id}"
                )));
            }
            Some(true) => return Err(GatewayError::AlreadyRefunded(capture_id.to_string())),
            Some(false) => {}
        }

        state.captures.insert(capture_id.to_string(), true);
        state.next_id += 1;
        Ok(RefundResult {
            refund_id: format!("REFUND-{:04}", state.next_id),
            status: "COMPLETED".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn reference() -> BookingReference {
        BookingReference::generate(Utc::now())
    }

    #[test]
    fn test_capture_status_mapping() {
        assert_eq!(CaptureStatus::from_provider("COMPLETED"), CaptureStatus::Completed);
        assert_eq!(CaptureStatus::from_provider("completed"), CaptureStatus::Completed);
        assert_eq!(CaptureStatus::from_provider("PENDING"), CaptureStatus::Pending);
        assert_eq!(
            CaptureStatus::from_provider("PARTIALLY_REFUNDED"),
            CaptureStatus::Other("PARTIALLY_REFUNDED".to_string())
        );
        assert!(CaptureStatus::Completed.is_settled());
        assert!(!CaptureStatus::Pending.is_settled());
        assert!(!CaptureStatus::Other("APPROVED".into()).is_settled());
    }

    #[tokio::test]
    async fn test_order_capture_refund() {
        let gateway = InMemoryPaymentGateway::new();
        let reference = reference();
        let order = gateway
            .create_order(Money::from_major(354), "USD", &reference)
            .await
            .unwrap();
        assert_eq!(order.order_id, "ORDER-0001");
        assert_eq!(gateway.order_reference(&order.order_id), Some(reference.to_string()));

        let capture = gateway.capture_order(&order.order_id).await.unwrap();
        assert_eq!(capture.status, CaptureStatus::Completed);
        assert_eq!(capture.amount, Some(Money::from_major(354)));

        let refund = gateway
            .refund(&capture.capture_id, Money::from_major(354), "USD")
            .await
            .unwrap();
        assert!(refund.refund_id.starts_with("REFUND-"));

        let again = gateway
            .refund(&capture.capture_id, Money::from_major(354), "USD")
            .await
            .unwrap_err();
        assert_eq!(again, GatewayError::AlreadyRefunded(capture.capture_id));
    }

    #[tokio::test]
    async fn test_rejects_unknown_order_and_bad_amount() {
        let gateway = InMemoryPaymentGateway::new();
        assert!(matches!(
            gateway.capture_order("ORDER-9999").await,
            Err(GatewayError::NotApproved(_))
        ));
        assert!(matches!(
            gateway.create_order(Money::zero(), "USD", &reference()).await,
            Err(GatewayError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_toggles() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_create(true);
        assert!(matches!(
            gateway.create_order(Money::from_major(10), "USD", &reference()).await,
            Err(GatewayError::Unavailable(_))
        ));
        assert_eq!(gateway.order_count(), 0);

        gateway.seed_order("ORDER-X", Money::from_major(10));
        gateway.set_capture_status(Some(CaptureStatus::Pending));
        let capture = gateway.capture_order("ORDER-X").await.unwrap();
        assert!(!capture.status.is_settled());
        assert_eq!(gateway.capture_calls(), 1);
    }
}
