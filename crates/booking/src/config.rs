//! Booking policy configuration.

use std::time::Duration;

use domain::{OverlapPolicy, PricingPolicy};

/// When a captured payment may be refunded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPolicy {
    pub enabled: bool,
    /// Refunds are refused once check-in is fewer than this many days away.
    pub min_days_before_check_in: i64,
}

impl Default for RefundPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            min_days_before_check_in: 0,
        }
    }
}

/// Settings for [`crate::BookingOrchestrator`].
#[derive(Debug, Clone)]
pub struct BookingConfig {
    pub pricing: PricingPolicy,
    pub overlap: OverlapPolicy,
    pub refund: RefundPolicy,
    /// Upper bound on a single payment gateway call.
    pub gateway_timeout: Duration,
    /// How long a pending booking holds its beds before it expires.
    pub payment_window: chrono::Duration,
    /// Attempts per operation when a commit loses an optimistic check.
    pub max_commit_attempts: u32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            pricing: PricingPolicy::default(),
            overlap: OverlapPolicy::default(),
            refund: RefundPolicy::default(),
            gateway_timeout: Duration::from_secs(15),
            payment_window: chrono::Duration::minutes(30),
            max_commit_attempts: 5,
        }
    }
}
