//! Resident profiles and room assignment.

use chrono::{DateTime, NaiveDate, Utc};
use common::{ResidentId, RoomId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during resident operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResidentError {
    /// Resident already holds a room.
    #[error("Resident {resident_id} is already assigned to room {room_id}")]
    AlreadyAssigned {
        resident_id: ResidentId,
        room_id: RoomId,
    },

    /// Name is required.
    #[error("Resident name is required")]
    NameRequired,

    /// Email is malformed.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

/// Lifecycle status of a resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResidentStatus {
    /// Holds a confirmed room assignment.
    Active,
    /// Previously held a room that has since been released.
    CheckedOut,
    /// Registered but never assigned.
    #[default]
    Inactive,
}

impl ResidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResidentStatus::Active => "active",
            ResidentStatus::CheckedOut => "checked_out",
            ResidentStatus::Inactive => "inactive",
        }
    }
}

impl std::str::FromStr for ResidentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ResidentStatus::Active),
            "checked_out" => Ok(ResidentStatus::CheckedOut),
            "inactive" => Ok(ResidentStatus::Inactive),
            other => Err(format!("unknown resident status: {other}")),
        }
    }
}

impl std::fmt::Display for ResidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for registering a resident profile.
#[derive(Debug, Clone)]
pub struct NewResident {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

/// A resident profile, owned by one user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resident {
    id: ResidentId,
    user_id: UserId,
    name: String,
    email: String,
    room_id: Option<RoomId>,
    check_in: Option<NaiveDate>,
    check_out: Option<NaiveDate>,
    status: ResidentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Resident {
    /// Registers a new, unassigned resident.
    pub fn new(input: NewResident, now: DateTime<Utc>) -> Result<Self, ResidentError> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ResidentError::NameRequired);
        }
        let email = input.email.trim().to_string();
        if !looks_like_email(&email) {
            return Err(ResidentError::InvalidEmail(email));
        }

        Ok(Self {
            id: ResidentId::new(),
            user_id: input.user_id,
            name,
            email,
            room_id: None,
            check_in: None,
            check_out: None,
            status: ResidentStatus::Inactive,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a resident from persisted columns.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: ResidentId,
        user_id: UserId,
        name: String,
        email: String,
        room_id: Option<RoomId>,
        check_in: Option<NaiveDate>,
        check_out: Option<NaiveDate>,
        status: ResidentStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            name,
            email,
            room_id,
            check_in,
            check_out,
            status,
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> ResidentId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn room_id(&self) -> Option<RoomId> {
        self.room_id
    }

    pub fn check_in(&self) -> Option<NaiveDate> {
        self.check_in
    }

    pub fn check_out(&self) -> Option<NaiveDate> {
        self.check_out
    }

    pub fn status(&self) -> ResidentStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the resident currently holds a room.
    pub fn holds_room(&self) -> bool {
        self.room_id.is_some()
    }

    /// Assigns a room for the given stay and marks the resident active.
    ///
    /// A resident holds at most one room; the previous assignment must have
    /// been cleared first.
    pub fn assign_room(
        &mut self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), ResidentError> {
        if let Some(current) = self.room_id {
            return Err(ResidentError::AlreadyAssigned {
                resident_id: self.id,
                room_id: current,
            });
        }

        self.room_id = Some(room_id);
        self.check_in = Some(check_in);
        self.check_out = Some(check_out);
        self.status = ResidentStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    /// Releases the current room assignment, keeping the stay dates as history.
    pub fn clear_assignment(&mut self, now: DateTime<Utc>) {
        self.room_id = None;
        self.status = ResidentStatus::CheckedOut;
        self.updated_at = now;
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resident() -> Resident {
        Resident::new(
            NewResident {
                user_id: UserId::new(),
                name: "Asha".to_string(),
                email: "asha@example.com".to_string(),
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_new_resident_is_inactive_and_unassigned() {
        let r = resident();
        assert_eq!(r.status(), ResidentStatus::Inactive);
        assert!(!r.holds_room());
    }

    #[test]
    fn test_registration_validation() {
        let input = |name: &str, email: &str| NewResident {
            user_id: UserId::new(),
            name: name.to_string(),
            email: email.to_string(),
        };
        assert_eq!(
            Resident::new(input(" ", "a@b.co"), Utc::now()).unwrap_err(),
            ResidentError::NameRequired
        );
        assert!(matches!(
            Resident::new(input("A", "not-an-email"), Utc::now()).unwrap_err(),
            ResidentError::InvalidEmail(_)
        ));
    }

    #[test]
    fn test_assign_and_clear() {
        let mut r = resident();
        let room = RoomId::new();
        r.assign_room(room, date(2030, 1, 1), date(2030, 1, 4), Utc::now())
            .unwrap();
        assert_eq!(r.room_id(), Some(room));
        assert_eq!(r.status(), ResidentStatus::Active);
        assert_eq!(r.check_out(), Some(date(2030, 1, 4)));

        r.clear_assignment(Utc::now());
        assert_eq!(r.room_id(), None);
        assert_eq!(r.status(), ResidentStatus::CheckedOut);
    }

    #[test]
    fn test_second_assignment_is_rejected() {
        let mut r = resident();
        let first = RoomId::new();
        r.assign_room(first, date(2030, 1, 1), date(2030, 1, 2), Utc::now())
            .unwrap();
        let err = r
            .assign_room(RoomId::new(), date(2030, 2, 1), date(2030, 2, 2), Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            ResidentError::AlreadyAssigned {
                resident_id: r.id(),
                room_id: first
            }
        );
        assert_eq!(r.room_id(), Some(first));
    }
}
