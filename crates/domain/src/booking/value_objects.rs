//! Value objects for the booking domain.

use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::BookingError;

/// Guest composition of a booking. Every guest occupies one bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guests {
    adults: u32,
    children: u32,
    #[serde(rename = "infantsUnder2")]
    infants_under_2: u32,
}

impl Guests {
    /// Validates raw counts: at least one adult, no negative counts.
    pub fn from_counts(adults: i64, children: i64, infants_under_2: i64) -> Result<Self, BookingError> {
        if adults < 1 {
            return Err(BookingError::InvalidGuestCount(format!(
                "at least one adult is required, got {adults}"
            )));
        }
        if children < 0 || infants_under_2 < 0 {
            return Err(BookingError::InvalidGuestCount(
                "children and infants cannot be negative".to_string(),
            ));
        }
        let narrow = |n: i64| {
            u32::try_from(n)
                .map_err(|_| BookingError::InvalidGuestCount(format!("guest count {n} is too large")))
        };
        let guests = Self {
            adults: narrow(adults)?,
            children: narrow(children)?,
            infants_under_2: narrow(infants_under_2)?,
        };
        guests
            .adults
            .checked_add(guests.children)
            .and_then(|n| n.checked_add(guests.infants_under_2))
            .ok_or_else(|| BookingError::InvalidGuestCount("too many guests".to_string()))?;
        Ok(guests)
    }

    pub fn adults(&self) -> u32 {
        self.adults
    }

    pub fn children(&self) -> u32 {
        self.children
    }

    pub fn infants_under_2(&self) -> u32 {
        self.infants_under_2
    }

    /// Total beds this party needs.
    pub fn total(&self) -> u32 {
        self.adults + self.children + self.infants_under_2
    }
}

/// Check-in / check-out dates of a stay, compared as whole days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StayDates {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl StayDates {
    /// Creates a stay; check-out must fall after check-in.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidDates(format!(
                "check-out {check_out} must be after check-in {check_in}"
            )));
        }
        Ok(Self {
            check_in,
            check_out,
        })
    }

    /// Creates a stay for a new booking, which may not start before `today`.
    pub fn upcoming(
        check_in: NaiveDate,
        check_out: NaiveDate,
        today: NaiveDate,
    ) -> Result<Self, BookingError> {
        if check_in < today {
            return Err(BookingError::InvalidDates(format!(
                "check-in {check_in} cannot be in the past"
            )));
        }
        Self::new(check_in, check_out)
    }

    /// Parses client-supplied dates and validates them against `today`.
    ///
    /// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp; the time of day is
    /// dropped.
    pub fn parse(check_in: &str, check_out: &str, today: NaiveDate) -> Result<Self, BookingError> {
        Self::upcoming(parse_day(check_in)?, parse_day(check_out)?, today)
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights; always at least one.
    pub fn nights(&self) -> u32 {
        let days = (self.check_out - self.check_in).num_days();
        u32::try_from(days).unwrap_or(u32::MAX)
    }

    /// Half-open interval overlap: a stay ending on day D does not clash
    /// with one starting on D.
    pub fn overlaps(&self, other: &StayDates) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

fn parse_day(value: &str) -> Result<NaiveDate, BookingError> {
    let value = value.trim();
    if let Ok(day) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(day);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.date_naive())
        .map_err(|_| BookingError::InvalidDates(format!("'{value}' is not a valid date")))
}

/// How a new booking is checked against the resident's other live bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// Reject stays whose date intervals intersect.
    #[default]
    Interval,
    /// Reject only stays starting on the same day.
    SameCheckIn,
    /// Never reject.
    Disabled,
}

impl OverlapPolicy {
    pub fn conflicts(&self, existing: &StayDates, requested: &StayDates) -> bool {
        match self {
            OverlapPolicy::Interval => existing.overlaps(requested),
            OverlapPolicy::SameCheckIn => existing.check_in() == requested.check_in(),
            OverlapPolicy::Disabled => false,
        }
    }
}

impl std::str::FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interval" => Ok(OverlapPolicy::Interval),
            "same_check_in" => Ok(OverlapPolicy::SameCheckIn),
            "disabled" => Ok(OverlapPolicy::Disabled),
            other => Err(format!("unknown overlap policy: {other}")),
        }
    }
}

const REFERENCE_ALPHABET: &[u8] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";
const REFERENCE_SUFFIX_LEN: usize = 6;

/// Human-readable booking reference, e.g. `BK-20261018093015-7QX2MA`.
///
/// Timestamp plus random suffix; uniqueness is ultimately enforced by the
/// store, and a colliding reference is regenerated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingReference(String);

impl BookingReference {
    /// Generates a fresh reference for a booking created at `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..REFERENCE_SUFFIX_LEN)
            .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
            .collect();
        Self(format!("BK-{}-{suffix}", now.format("%Y%m%d%H%M%S")))
    }

    /// Accepts a reference supplied by a client or read from storage.
    pub fn parse(value: &str) -> Result<Self, BookingError> {
        let value = value.trim();
        let valid = !value.is_empty()
            && value.len() <= 64
            && value
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-');
        if valid {
            Ok(Self(value.to_string()))
        } else {
            Err(BookingError::InvalidReference(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookingReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
