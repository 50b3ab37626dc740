use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{BookingId, ResidentId, RoomId, UserId};
use domain::{
    Booking, BookingReference, BookingStatus, Guests, Money, PaymentRecord, PriceBreakdown,
    Resident, Room, StayDates,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{Change, ChangeSet, Result, Store, StoreError, Version, Versioned};

const ROOM_COLUMNS: &str = "id, room_number, room_type, price_per_night_cents, capacity, \
     bed_remaining, version, created_at, updated_at";

const RESIDENT_COLUMNS: &str = "id, user_id, name, email, room_id, check_in, check_out, status, \
     version, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, reference, user_id, resident_id, room_id, check_in, check_out, \
     adults, children, infants_under_2, price, status, payment_status, payment_order_id, \
     payment_capture_id, amount_paid_cents, paid_at, refund_id, refunded_at, version, \
     created_at, updated_at";

/// PostgreSQL-backed store implementation.
///
/// A change set runs inside one database transaction. Updates are
/// compare-and-swap on the `version` column, so a stale write affects no row
/// and rolls the whole transaction back.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_room(row: PgRow) -> Result<Versioned<Room>> {
        let id = RoomId::from_uuid(row.try_get::<Uuid, _>("id")?);
        let room_type = row
            .try_get::<String, _>("room_type")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let room = Room::restore(
            id,
            row.try_get("room_number")?,
            room_type,
            Money::from_cents(row.try_get("price_per_night_cents")?),
            from_i32(row.try_get("capacity")?, "capacity")?,
            from_i32(row.try_get("bed_remaining")?, "bed_remaining")?,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        )
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Versioned::new(room, Version::new(row.try_get("version")?)))
    }

    fn row_to_resident(row: PgRow) -> Result<Versioned<Resident>> {
        let status = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let resident = Resident::restore(
            ResidentId::from_uuid(row.try_get::<Uuid, _>("id")?),
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            row.try_get("name")?,
            row.try_get("email")?,
            row.try_get::<Option<Uuid>, _>("room_id")?
                .map(RoomId::from_uuid),
            row.try_get::<Option<NaiveDate>, _>("check_in")?,
            row.try_get::<Option<NaiveDate>, _>("check_out")?,
            status,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        );
        Ok(Versioned::new(resident, Version::new(row.try_get("version")?)))
    }

    fn row_to_booking(row: PgRow) -> Result<Versioned<Booking>> {
        let corrupt = |e: domain::BookingError| StoreError::Corrupt(e.to_string());

        let reference =
            BookingReference::parse(&row.try_get::<String, _>("reference")?).map_err(corrupt)?;
        let stay = StayDates::new(row.try_get("check_in")?, row.try_get("check_out")?)
            .map_err(corrupt)?;
        let guests = Guests::from_counts(
            i64::from(row.try_get::<i32, _>("adults")?),
            i64::from(row.try_get::<i32, _>("children")?),
            i64::from(row.try_get::<i32, _>("infants_under_2")?),
        )
        .map_err(corrupt)?;
        let price: PriceBreakdown = serde_json::from_value(row.try_get("price")?)?;
        let status: BookingStatus = row
            .try_get::<String, _>("status")?
            .parse()
            .map_err(StoreError::Corrupt)?;
        let payment = PaymentRecord {
            status: row
                .try_get::<String, _>("payment_status")?
                .parse()
                .map_err(StoreError::Corrupt)?,
            order_id: row.try_get("payment_order_id")?,
            capture_id: row.try_get("payment_capture_id")?,
            amount_paid: row
                .try_get::<Option<i64>, _>("amount_paid_cents")?
                .map(Money::from_cents),
            paid_at: row.try_get::<Option<DateTime<Utc>>, _>("paid_at")?,
            refund_id: row.try_get("refund_id")?,
            refunded_at: row.try_get::<Option<DateTime<Utc>>, _>("refunded_at")?,
        };

        let booking = Booking::restore(
            BookingId::from_uuid(row.try_get::<Uuid, _>("id")?),
            reference,
            UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            ResidentId::from_uuid(row.try_get::<Uuid, _>("resident_id")?),
            RoomId::from_uuid(row.try_get::<Uuid, _>("room_id")?),
            stay,
            guests,
            price,
            status,
            payment,
            row.try_get("created_at")?,
            row.try_get("updated_at")?,
        );
        Ok(Versioned::new(booking, Version::new(row.try_get("version")?)))
    }
}

fn from_i32(value: i32, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative {field}: {value}")))
}

fn to_i32(value: u32, field: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("{field} out of range: {value}")))
}

/// Maps a unique-constraint violation to its domain error.
fn map_unique_violation(e: sqlx::Error, duplicate: impl FnOnce(&str) -> Option<StoreError>) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
        && let Some(mapped) = duplicate(constraint)
    {
        return mapped;
    }
    StoreError::Database(e)
}

fn conflict(entity: &'static str, id: impl ToString, expected: Version) -> StoreError {
    metrics::counter!("store_commit_conflicts_total").increment(1);
    StoreError::ConcurrencyConflict {
        entity,
        id: id.to_string(),
        expected,
    }
}

async fn insert_room(conn: &mut PgConnection, room: &Room) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO rooms (id, room_number, room_type, price_per_night_cents, capacity,
                           bed_remaining, is_available, status, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(room.id().as_uuid())
    .bind(room.room_number())
    .bind(room.room_type().as_str())
    .bind(room.price_per_night().cents())
    .bind(to_i32(room.capacity(), "capacity")?)
    .bind(to_i32(room.bed_remaining(), "bed_remaining")?)
    .bind(room.is_available())
    .bind(room.status().as_str())
    .bind(Version::first().as_i64())
    .bind(room.created_at())
    .bind(room.updated_at())
    .execute(conn)
    .await
    .map_err(|e| {
        map_unique_violation(e, |constraint| {
            (constraint == "unique_room_number")
                .then(|| StoreError::DuplicateRoomNumber(room.room_number().to_string()))
        })
    })?;
    Ok(())
}

async fn update_room(conn: &mut PgConnection, room: &Room, expected: Version) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE rooms
        SET price_per_night_cents = $3, bed_remaining = $4, is_available = $5, status = $6,
            updated_at = $7, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(room.id().as_uuid())
    .bind(expected.as_i64())
    .bind(room.price_per_night().cents())
    .bind(to_i32(room.bed_remaining(), "bed_remaining")?)
    .bind(room.is_available())
    .bind(room.status().as_str())
    .bind(room.updated_at())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(conflict("room", room.id(), expected));
    }
    Ok(())
}

async fn insert_resident(conn: &mut PgConnection, resident: &Resident) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO residents (id, user_id, name, email, room_id, check_in, check_out, status,
                               version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(resident.id().as_uuid())
    .bind(resident.user_id().as_uuid())
    .bind(resident.name())
    .bind(resident.email())
    .bind(resident.room_id().map(|id| id.as_uuid()))
    .bind(resident.check_in())
    .bind(resident.check_out())
    .bind(resident.status().as_str())
    .bind(Version::first().as_i64())
    .bind(resident.created_at())
    .bind(resident.updated_at())
    .execute(conn)
    .await
    .map_err(|e| {
        map_unique_violation(e, |constraint| {
            (constraint == "unique_resident_user")
                .then(|| StoreError::DuplicateResident(resident.user_id()))
        })
    })?;
    Ok(())
}

async fn update_resident(
    conn: &mut PgConnection,
    resident: &Resident,
    expected: Version,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE residents
        SET name = $3, email = $4, room_id = $5, check_in = $6, check_out = $7, status = $8,
            updated_at = $9, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(resident.id().as_uuid())
    .bind(expected.as_i64())
    .bind(resident.name())
    .bind(resident.email())
    .bind(resident.room_id().map(|id| id.as_uuid()))
    .bind(resident.check_in())
    .bind(resident.check_out())
    .bind(resident.status().as_str())
    .bind(resident.updated_at())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(conflict("resident", resident.id(), expected));
    }
    Ok(())
}

async fn insert_booking(conn: &mut PgConnection, booking: &Booking) -> Result<()> {
    let guests = booking.guests();
    let payment = booking.payment();
    sqlx::query(
        r#"
        INSERT INTO bookings (id, reference, user_id, resident_id, room_id, check_in, check_out,
                              adults, children, infants_under_2, price, total_cents, status,
                              payment_status, payment_order_id, payment_capture_id,
                              amount_paid_cents, paid_at, refund_id, refunded_at, version,
                              created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23)
        "#,
    )
    .bind(booking.id().as_uuid())
    .bind(booking.reference().as_str())
    .bind(booking.user_id().as_uuid())
    .bind(booking.resident_id().as_uuid())
    .bind(booking.room_id().as_uuid())
    .bind(booking.stay().check_in())
    .bind(booking.stay().check_out())
    .bind(to_i32(guests.adults(), "adults")?)
    .bind(to_i32(guests.children(), "children")?)
    .bind(to_i32(guests.infants_under_2(), "infants_under_2")?)
    .bind(serde_json::to_value(booking.price())?)
    .bind(booking.price().total.cents())
    .bind(booking.status().as_str())
    .bind(payment.status.as_str())
    .bind(payment.order_id.as_deref())
    .bind(payment.capture_id.as_deref())
    .bind(payment.amount_paid.map(|m| m.cents()))
    .bind(payment.paid_at)
    .bind(payment.refund_id.as_deref())
    .bind(payment.refunded_at)
    .bind(Version::first().as_i64())
    .bind(booking.created_at())
    .bind(booking.updated_at())
    .execute(conn)
    .await
    .map_err(|e| {
        map_unique_violation(e, |constraint| {
            (constraint == "unique_booking_reference")
                .then(|| StoreError::DuplicateReference(booking.reference().to_string()))
        })
    })?;
    Ok(())
}

async fn update_booking(conn: &mut PgConnection, booking: &Booking, expected: Version) -> Result<()> {
    let payment = booking.payment();
    let result = sqlx::query(
        r#"
        UPDATE bookings
        SET status = $3, payment_status = $4, payment_order_id = $5, payment_capture_id = $6,
            amount_paid_cents = $7, paid_at = $8, refund_id = $9, refunded_at = $10,
            updated_at = $11, version = version + 1
        WHERE id = $1 AND version = $2
        "#,
    )
    .bind(booking.id().as_uuid())
    .bind(expected.as_i64())
    .bind(booking.status().as_str())
    .bind(payment.status.as_str())
    .bind(payment.order_id.as_deref())
    .bind(payment.capture_id.as_deref())
    .bind(payment.amount_paid.map(|m| m.cents()))
    .bind(payment.paid_at)
    .bind(payment.refund_id.as_deref())
    .bind(payment.refunded_at)
    .bind(booking.updated_at())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(conflict("booking", booking.id(), expected));
    }
    Ok(())
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_room(&self, id: RoomId) -> Result<Option<Versioned<Room>>> {
        let row = sqlx::query(&format!("SELECT {ROOM_COLUMNS} FROM rooms WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_room).transpose()
    }

    async fn list_rooms(&self, available_only: bool) -> Result<Vec<Room>> {
        let rows = sqlx::query(&format!(
            "SELECT {ROOM_COLUMNS} FROM rooms WHERE ($1 = FALSE OR is_available) ORDER BY room_number ASC"
        ))
        .bind(available_only)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Self::row_to_room(row).map(Versioned::into_inner))
            .collect()
    }

    async fn get_resident(&self, id: ResidentId) -> Result<Option<Versioned<Resident>>> {
        let row = sqlx::query(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_resident).transpose()
    }

    async fn find_resident_by_user(&self, user_id: UserId) -> Result<Option<Versioned<Resident>>> {
        let row = sqlx::query(&format!(
            "SELECT {RESIDENT_COLUMNS} FROM residents WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_resident).transpose()
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Versioned<Booking>>> {
        let row = sqlx::query(&format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn find_booking_by_reference(
        &self,
        reference: &BookingReference,
    ) -> Result<Option<Versioned<Booking>>> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE reference = $1"
        ))
        .bind(reference.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_booking).transpose()
    }

    async fn bookings_for_resident(&self, resident_id: ResidentId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE resident_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(resident_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Self::row_to_booking(row).map(Versioned::into_inner))
            .collect()
    }

    async fn bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE user_id = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Self::row_to_booking(row).map(Versioned::into_inner))
            .collect()
    }

    async fn bookings_by_status(&self, status: BookingStatus) -> Result<Vec<Booking>> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| Self::row_to_booking(row).map(Versioned::into_inner))
            .collect()
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        let count = changes.len();
        let mut tx = self.pool.begin().await?;

        for change in changes {
            tracing::trace!(change = change.label(), "applying change");
            match &change {
                Change::InsertRoom(room) => insert_room(&mut *tx, room).await?,
                Change::UpdateRoom { room, expected } => update_room(&mut *tx, room, *expected).await?,
                Change::InsertResident(resident) => insert_resident(&mut *tx, resident).await?,
                Change::UpdateResident { resident, expected } => {
                    update_resident(&mut *tx, resident, *expected).await?
                }
                Change::InsertBooking(booking) => insert_booking(&mut *tx, booking).await?,
                Change::UpdateBooking { booking, expected } => {
                    update_booking(&mut *tx, booking, *expected).await?
                }
            }
        }

        tx.commit().await?;
        tracing::debug!(changes = count, "committed change set");
        Ok(())
    }
}
