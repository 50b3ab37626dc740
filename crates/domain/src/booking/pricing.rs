//! Stay pricing.

use serde::{Deserialize, Serialize};

use super::{BookingError, Guests, StayDates};
use crate::Money;

/// How the guest party scales the nightly room rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum GuestPricing {
    /// The nightly rate covers the whole party.
    #[default]
    PerRoom,
    /// Every adult pays the nightly rate; children and infants pay the given
    /// percentage of it.
    PerGuest {
        child_percent: u32,
        infant_percent: u32,
    },
}

impl GuestPricing {
    /// Multiplier applied to `nightly rate × nights`, in percent.
    ///
    /// Returns `None` when the party is too large to express.
    pub fn multiplier_percent(&self, guests: &Guests) -> Option<u32> {
        match self {
            GuestPricing::PerRoom => Some(100),
            GuestPricing::PerGuest {
                child_percent,
                infant_percent,
            } => guests
                .adults()
                .checked_mul(100)?
                .checked_add(guests.children().checked_mul(*child_percent)?)?
                .checked_add(guests.infants_under_2().checked_mul(*infant_percent)?),
        }
    }
}

/// Rates used to quote a stay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate in basis points, applied to the room cost.
    pub tax_rate_bps: u32,
    /// Flat service (maintenance) charge added to every booking.
    pub service_charge: Money,
    pub guest_pricing: GuestPricing,
    /// ISO 4217 code every price is quoted in.
    pub currency: String,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 1800,
            service_charge: Money::zero(),
            guest_pricing: GuestPricing::PerRoom,
            currency: "USD".to_string(),
        }
    }
}

impl PricingPolicy {
    /// Quotes a stay:
    /// `room cost = rate × nights × multiplier`, `tax = room cost × tax rate`,
    /// `total = room cost + service charge + tax`.
    ///
    /// Fails with [`BookingError::PriceOutOfRange`] when any step overflows.
    pub fn quote(
        &self,
        nightly_rate: Money,
        stay: &StayDates,
        guests: &Guests,
    ) -> Result<PriceBreakdown, BookingError> {
        let nights = stay.nights();
        let out_of_range = || {
            BookingError::PriceOutOfRange(format!(
                "{nights} night(s) at {nightly_rate} for {} guest(s)",
                guests.total()
            ))
        };
        let multiplier = self
            .guest_pricing
            .multiplier_percent(guests)
            .ok_or_else(out_of_range)?;
        let base_cost = nightly_rate
            .checked_multiply(nights)
            .and_then(|cost| cost.checked_scale_percent(multiplier))
            .ok_or_else(out_of_range)?;
        let tax = base_cost
            .checked_apply_rate_bps(self.tax_rate_bps)
            .ok_or_else(out_of_range)?;
        let total = base_cost
            .checked_add(self.service_charge)
            .and_then(|sum| sum.checked_add(tax))
            .ok_or_else(out_of_range)?;

        Ok(PriceBreakdown {
            nights,
            nightly_rate,
            guest_multiplier_percent: multiplier,
            base_cost,
            service_charge: self.service_charge,
            tax_rate_bps: self.tax_rate_bps,
            tax,
            total,
            currency: self.currency.clone(),
        })
    }
}

/// The single price shape stored on every booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub nights: u32,
    pub nightly_rate: Money,
    pub guest_multiplier_percent: u32,
    pub base_cost: Money,
    pub service_charge: Money,
    pub tax_rate_bps: u32,
    pub tax: Money,
    pub total: Money,
    pub currency: String,
}
