//! External collaborators: payment gateway and notification delivery.

pub mod notification;
pub mod payment;
pub mod paypal;

pub use notification::{
    InMemoryNotifier, LoggingNotifier, Notification, NotificationError, Notifier, Receipt,
};
pub use payment::{
    CaptureStatus, CapturedOrder, CreatedOrder, GatewayError, InMemoryPaymentGateway,
    PaymentGateway, RefundResult,
};
pub use paypal::{PayPalConfig, PayPalGateway, PayPalMode};
