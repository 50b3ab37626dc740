//! Application configuration loaded from environment variables.

use std::time::Duration;

use booking::{BookingConfig, PayPalConfig, PayPalMode, RefundPolicy};
use domain::{GuestPricing, Money, OverlapPolicy, PricingPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`, `PORT`: bind address (default `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json`
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory storage when unset
/// - `PAYPAL_CLIENT_ID`, `PAYPAL_SECRET`, `PAYPAL_MODE`, `PAYPAL_RETURN_URL`,
///   `PAYPAL_CANCEL_URL`: PayPal credentials; a simulated gateway is used
///   when the credentials are missing
/// - `CURRENCY`, `TAX_RATE_BPS`, `SERVICE_CHARGE_CENTS`, `GUEST_PRICING`
///   (`per_room` or `per_guest`), `CHILD_RATE_PERCENT`, `INFANT_RATE_PERCENT`
/// - `OVERLAP_POLICY`: `interval`, `same_check_in` or `disabled`
/// - `REFUNDS_ENABLED`, `REFUND_MIN_DAYS_BEFORE_CHECK_IN`
/// - `GATEWAY_TIMEOUT_SECS`, `PAYMENT_WINDOW_MINUTES`, `EXPIRY_SWEEP_SECS`
///
/// Unparsable values fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub paypal: Option<PayPalConfig>,
    pub booking: BookingConfig,
    /// Interval between sweeps for expired pending bookings.
    pub expiry_sweep_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            paypal: paypal_from(&lookup),
            booking: booking_from(&lookup),
            expiry_sweep_interval: parse_var::<u64, _>(&lookup, "EXPIRY_SWEEP_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.expiry_sweep_interval),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            database_url: None,
            paypal: None,
            booking: BookingConfig::default(),
            expiry_sweep_interval: Duration::from_secs(60),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

fn paypal_from<F>(lookup: &F) -> Option<PayPalConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let client_id = lookup("PAYPAL_CLIENT_ID").filter(|v| !v.is_empty())?;
    let secret = lookup("PAYPAL_SECRET").filter(|v| !v.is_empty())?;
    let mode = lookup("PAYPAL_MODE")
        .and_then(|m| m.parse::<PayPalMode>().ok())
        .unwrap_or_default();

    Some(PayPalConfig {
        client_id,
        secret,
        base_url: mode.base_url().to_string(),
        return_url: lookup("PAYPAL_RETURN_URL")
            .unwrap_or_else(|| "http://localhost:3000/payments/success".to_string()),
        cancel_url: lookup("PAYPAL_CANCEL_URL")
            .unwrap_or_else(|| "http://localhost:3000/payments/cancel".to_string()),
    })
}

fn booking_from<F>(lookup: &F) -> BookingConfig
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = BookingConfig::default();
    let parsed_u32 = |key: &str| parse_var::<u32, _>(lookup, key);
    let parsed_i64 = |key: &str| parse_var::<i64, _>(lookup, key);

    let guest_pricing = match lookup("GUEST_PRICING").as_deref() {
        Some("per_guest") => GuestPricing::PerGuest {
            child_percent: parsed_u32("CHILD_RATE_PERCENT").unwrap_or(50),
            infant_percent: parsed_u32("INFANT_RATE_PERCENT").unwrap_or(0),
        },
        _ => GuestPricing::PerRoom,
    };

    let pricing = PricingPolicy {
        tax_rate_bps: parsed_u32("TAX_RATE_BPS").unwrap_or(defaults.pricing.tax_rate_bps),
        service_charge: parsed_i64("SERVICE_CHARGE_CENTS")
            .filter(|cents| *cents >= 0)
            .map(Money::from_cents)
            .unwrap_or(defaults.pricing.service_charge),
        guest_pricing,
        currency: lookup("CURRENCY")
            .map(|c| c.trim().to_ascii_uppercase())
            .filter(|c| c.len() == 3)
            .unwrap_or(defaults.pricing.currency),
    };

    let refund = RefundPolicy {
        enabled: parse_var(lookup, "REFUNDS_ENABLED").unwrap_or(defaults.refund.enabled),
        min_days_before_check_in: parsed_i64("REFUND_MIN_DAYS_BEFORE_CHECK_IN")
            .unwrap_or(defaults.refund.min_days_before_check_in),
    };

    BookingConfig {
        pricing,
        overlap: lookup("OVERLAP_POLICY")
            .and_then(|p| p.parse::<OverlapPolicy>().ok())
            .unwrap_or(defaults.overlap),
        refund,
        gateway_timeout: parsed_i64("GATEWAY_TIMEOUT_SECS")
            .filter(|secs| *secs > 0)
            .map(|secs| Duration::from_secs(secs.unsigned_abs()))
            .unwrap_or(defaults.gateway_timeout),
        payment_window: parsed_i64("PAYMENT_WINDOW_MINUTES")
            .filter(|mins| *mins > 0)
            .map(chrono::Duration::minutes)
            .unwrap_or(defaults.payment_window),
        max_commit_attempts: defaults.max_commit_attempts,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert!(config.paypal.is_none());
        assert_eq!(config.expiry_sweep_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.booking.pricing, PricingPolicy::default());
        assert_eq!(config.booking.overlap, OverlapPolicy::Interval);
        assert_eq!(config.booking.refund, RefundPolicy::default());
    }

    #[test]
    fn test_server_and_storage_settings() {
        let config = config_from(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8081"),
            ("LOG_FORMAT", "json"),
            ("DATABASE_URL", "postgres://hostel@localhost/hostel"),
            ("EXPIRY_SWEEP_SECS", "5"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:8081");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://hostel@localhost/hostel")
        );
        assert_eq!(config.expiry_sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_from(&[
            ("PORT", "not-a-port"),
            ("TAX_RATE_BPS", "-3"),
            ("CURRENCY", "dollars"),
            ("OVERLAP_POLICY", "sometimes"),
            ("EXPIRY_SWEEP_SECS", "0"),
            ("DATABASE_URL", ""),
        ]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.booking.pricing.tax_rate_bps, 1800);
        assert_eq!(config.booking.pricing.currency, "USD");
        assert_eq!(config.booking.overlap, OverlapPolicy::Interval);
        assert_eq!(config.expiry_sweep_interval, Duration::from_secs(60));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_booking_policies() {
        let config = config_from(&[
            ("CURRENCY", "inr"),
            ("TAX_RATE_BPS", "1200"),
            ("SERVICE_CHARGE_CENTS", "2500"),
            ("GUEST_PRICING", "per_guest"),
            ("CHILD_RATE_PERCENT", "40"),
            ("OVERLAP_POLICY", "same_check_in"),
            ("REFUNDS_ENABLED", "false"),
            ("REFUND_MIN_DAYS_BEFORE_CHECK_IN", "3"),
            ("GATEWAY_TIMEOUT_SECS", "4"),
            ("PAYMENT_WINDOW_MINUTES", "10"),
        ]);
        let booking = config.booking;
        assert_eq!(booking.pricing.currency, "INR");
        assert_eq!(booking.pricing.tax_rate_bps, 1200);
        assert_eq!(booking.pricing.service_charge, Money::from_cents(2500));
        assert_eq!(
            booking.pricing.guest_pricing,
            GuestPricing::PerGuest {
                child_percent: 40,
                infant_percent: 0
            }
        );
        assert_eq!(booking.overlap, OverlapPolicy::SameCheckIn);
        assert!(!booking.refund.enabled);
        assert_eq!(booking.refund.min_days_before_check_in, 3);
        assert_eq!(booking.gateway_timeout, Duration::from_secs(4));
        assert_eq!(booking.payment_window, chrono::Duration::minutes(10));
    }

    #[test]
    fn test_paypal_requires_both_credentials() {
        assert!(config_from(&[("PAYPAL_CLIENT_ID", "id")]).paypal.is_none());

        let config = config_from(&[
            ("PAYPAL_CLIENT_ID", "id"),
            ("PAYPAL_SECRET", "s3cr3t-value"),
            ("PAYPAL_MODE", "LIVE"),
        ]);
        let paypal = config.paypal.unwrap();
        assert_eq!(paypal.base_url, PayPalMode::Live.base_url());
        assert_eq!(paypal.return_url, "http://localhost:3000/payments/success");
        assert!(!format!("{paypal:?}").contains("s3cr3t-value"));
    }
}
