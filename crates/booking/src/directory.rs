//! Resident directory.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{ResidentId, RoomId, UserId};
use domain::{NewResident, Resident};
use store::{Store, Transaction};

use crate::error::{BookingServiceError, Result};

/// Owns resident records and their room assignment.
#[derive(Clone)]
pub struct ResidentDirectory {
    store: Arc<dyn Store>,
}

impl ResidentDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn get_resident(&self, id: ResidentId) -> Result<Resident> {
        self.store
            .get_resident(id)
            .await?
            .map(|record| record.into_inner())
            .ok_or(BookingServiceError::ResidentNotFound(id))
    }

    /// Creates the resident profile of a user. A user has at most one.
    #[tracing::instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn register(&self, input: NewResident) -> Result<Resident> {
        let resident = Resident::new(input, Utc::now())?;
        let mut tx = Transaction::begin(self.store.as_ref());
        if tx.resident_for_user(resident.user_id()).await?.is_some() {
            return Err(BookingServiceError::ResidentAlreadyRegistered(
                resident.user_id(),
            ));
        }
        tx.insert_resident(resident.clone());
        tx.commit().await?;
        tracing::info!(resident_id = %resident.id(), "resident registered");
        Ok(resident)
    }

    pub async fn resident_for_user(
        &self,
        tx: &mut Transaction<'_>,
        user_id: UserId,
    ) -> Result<Resident> {
        tx.resident_for_user(user_id)
            .await?
            .ok_or(BookingServiceError::NoResidentProfile(user_id))
    }

    /// Gives the resident a room for the stay and marks them active.
    pub async fn assign_room(
        &self,
        tx: &mut Transaction<'_>,
        resident_id: ResidentId,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> Result<Resident> {
        let mut resident = self.load(tx, resident_id).await?;
        resident.assign_room(room_id, check_in, check_out, Utc::now())?;
        tx.update_resident(resident.clone())?;
        Ok(resident)
    }

    /// Drops the resident's room and checks them out.
    pub async fn clear_assignment(
        &self,
        tx: &mut Transaction<'_>,
        resident_id: ResidentId,
    ) -> Result<Resident> {
        let mut resident = self.load(tx, resident_id).await?;
        resident.clear_assignment(Utc::now());
        tx.update_resident(resident.clone())?;
        Ok(resident)
    }

    async fn load(&self, tx: &mut Transaction<'_>, id: ResidentId) -> Result<Resident> {
        tx.resident(id)
            .await?
            .ok_or(BookingServiceError::ResidentNotFound(id))
    }
}
