use domain::{Booking, Resident, Room};

use crate::Version;

/// A single staged write.
#[derive(Debug, Clone)]
pub enum Change {
    InsertRoom(Room),
    UpdateRoom { room: Room, expected: Version },
    InsertResident(Resident),
    UpdateResident { resident: Resident, expected: Version },
    InsertBooking(Booking),
    UpdateBooking { booking: Booking, expected: Version },
}

impl Change {
    /// Short label used in logs.
    pub fn label(&self) -> &'static str {
        match self {
            Change::InsertRoom(_) => "insert_room",
            Change::UpdateRoom { .. } => "update_room",
            Change::InsertResident(_) => "insert_resident",
            Change::UpdateResident { .. } => "update_resident",
            Change::InsertBooking(_) => "insert_booking",
            Change::UpdateBooking { .. } => "update_booking",
        }
    }
}

/// Writes committed together: either all of them become visible or none.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.changes.iter()
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl FromIterator<Change> for ChangeSet {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}
