//! HTTP route handlers.

pub mod bookings;
pub mod payments;
pub mod residents;
pub mod rooms;
pub mod system;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses an id taken from the request path.
fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} id: {raw}")))
}
