//! Booking lifecycle for the hostel.
//!
//! The [`BookingOrchestrator`] coordinates three record owners inside one
//! store transaction per operation:
//! 1. [`RoomInventory`] holds and releases beds
//! 2. [`ResidentDirectory`] assigns and clears rooms
//! 3. [`BookingLedger`] records bookings and their status transitions
//!
//! Calls to the [`PaymentGateway`] happen outside the transaction and never
//! mutate local state on failure. Notifications go out after commit on a
//! best-effort basis.

pub mod config;
pub mod directory;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod orchestrator;
pub mod services;

pub use config::{BookingConfig, RefundPolicy};
pub use directory::ResidentDirectory;
pub use error::{BookingServiceError, ErrorKind, Result};
pub use inventory::RoomInventory;
pub use ledger::{BookingLedger, PaymentUpdate};
pub use orchestrator::{
    BookingConfirmation, BookingOrchestrator, CreateBookingRequest, GuestCounts, PaymentOrder,
};
pub use services::{
    CaptureStatus, CapturedOrder, CreatedOrder, GatewayError, InMemoryNotifier,
    InMemoryPaymentGateway, LoggingNotifier, Notification, NotificationError, Notifier,
    PayPalConfig, PayPalGateway, PayPalMode, PaymentGateway, Receipt, RefundResult,
};
