//! Room classification and occupancy status.

use serde::{Deserialize, Serialize};

/// Room type offered by the hostel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// Air-conditioned room.
    Ac,
    /// Room without air conditioning.
    NonAc,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Ac => "ac",
            RoomType::NonAc => "non_ac",
        }
    }
}

impl std::str::FromStr for RoomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ac" => Ok(RoomType::Ac),
            "non_ac" => Ok(RoomType::NonAc),
            other => Err(format!("unknown room type: {other}")),
        }
    }
}

impl std::fmt::Display for RoomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Occupancy status of a room, derived from its bed counts.
///
/// ```text
/// Available (no bed committed) ──► Reserved (some committed) ──► Occupied (none free)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Every bed is free.
    Available,
    /// Some beds are held, some are still free.
    Reserved,
    /// No bed is free.
    Occupied,
}

impl RoomStatus {
    /// Derives the status from capacity and free bed count.
    pub fn derive(capacity: u32, bed_remaining: u32) -> Self {
        if bed_remaining == 0 {
            RoomStatus::Occupied
        } else if bed_remaining >= capacity {
            RoomStatus::Available
        } else {
            RoomStatus::Reserved
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Reserved => "reserved",
            RoomStatus::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
