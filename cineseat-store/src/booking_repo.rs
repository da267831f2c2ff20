use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use cineseat_domain::booking::{BookedSeat, Booking, BookingStatus, PaymentStatus};
use cineseat_domain::error::BookingError;
use cineseat_domain::repository::BookingRepository;

/// Postgres-backed booking store.
///
/// Each trait method is one transaction. The dropped `sqlx::Transaction`
/// rolls back automatically, so every `?` exit leaves the database
/// untouched. The `booked_seats` table carries a denormalized session id
/// with `UNIQUE (session_id, seat_id)`; since terminal bookings never keep
/// seat rows, that index is exactly a uniqueness constraint scoped to
/// non-terminal bookings, and it is what resolves racing creates.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    booking_status: String,
    payment_status: String,
    expires_at: DateTime<Utc>,
    session_start_time: DateTime<Utc>,
    session_end_time: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    booking_id: Uuid,
    seat_id: Uuid,
}

const BOOKING_COLUMNS: &str = "id, session_id, user_id, booking_status, payment_status, \
     expires_at, session_start_time, session_end_time, created_at, updated_at, deleted_at";

impl BookingRow {
    fn into_booking(self, seats: Vec<BookedSeat>) -> Result<Booking, BookingError> {
        Ok(Booking {
            id: self.id,
            session_id: self.session_id,
            user_id: self.user_id,
            booking_status: BookingStatus::parse(&self.booking_status)?,
            payment_status: PaymentStatus::parse(&self.payment_status)?,
            expires_at: self.expires_at,
            session_start_time: self.session_start_time,
            session_end_time: self.session_end_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: self.deleted_at,
            seats,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl PgBookingRepository {
    async fn seats_for<'e, E>(&self, executor: E, booking_id: Uuid) -> Result<Vec<BookedSeat>, BookingError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let rows: Vec<SeatRow> =
            sqlx::query_as("SELECT id, booking_id, seat_id FROM booked_seats WHERE booking_id = $1")
                .bind(booking_id)
                .fetch_all(executor)
                .await
                .map_err(BookingError::storage)?;

        Ok(rows
            .into_iter()
            .map(|row| BookedSeat {
                id: row.id,
                booking_id: row.booking_id,
                seat_id: row.seat_id,
            })
            .collect())
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_with_seats(
        &self,
        booking: &Booking,
        seat_ids: &[Uuid],
    ) -> Result<Booking, BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;

        sqlx::query(
            "INSERT INTO bookings (id, session_id, user_id, booking_status, payment_status, \
             expires_at, session_start_time, session_end_time, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(booking.id)
        .bind(booking.session_id)
        .bind(booking.user_id)
        .bind(booking.booking_status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.expires_at)
        .bind(booking.session_start_time)
        .bind(booking.session_end_time)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        for seat_id in seat_ids {
            let inserted = sqlx::query(
                "INSERT INTO booked_seats (id, booking_id, session_id, seat_id) \
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(Uuid::new_v4())
            .bind(booking.id)
            .bind(booking.session_id)
            .bind(seat_id)
            .execute(&mut *tx)
            .await;

            if let Err(err) = inserted {
                if is_unique_violation(&err) {
                    // Lost the race for this seat; the dropped transaction
                    // rolls the whole booking back. Re-query outside the
                    // transaction to name every conflicting seat.
                    drop(tx);
                    let mut held = self.held_seats(booking.session_id, seat_ids).await?;
                    if held.is_empty() {
                        held.push(*seat_id);
                    }
                    return Err(BookingError::SeatsAlreadyBooked(held));
                }
                return Err(BookingError::storage(err));
            }
        }

        let row: BookingRow = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(booking.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        let seats = self.seats_for(&mut *tx, booking.id).await?;

        tx.commit().await.map_err(BookingError::storage)?;

        row.into_booking(seats)
    }

    async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        let row: Option<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        let row = row.ok_or(BookingError::BookingNotFound(id))?;
        let seats = self.seats_for(&self.pool, id).await?;
        row.into_booking(seats)
    }

    async fn list(&self) -> Result<Vec<Booking>, BookingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE deleted_at IS NULL ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        let mut bookings = Vec::with_capacity(rows.len());
        for row in rows {
            let seats = self.seats_for(&self.pool, row.id).await?;
            bookings.push(row.into_booking(seats)?);
        }
        Ok(bookings)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<(), BookingError> {
        let result = sqlx::query(
            "UPDATE bookings SET booking_status = $1, \
             payment_status = COALESCE($2, payment_status), updated_at = $3 \
             WHERE id = $4 AND deleted_at IS NULL",
        )
        .bind(status.as_str())
        .bind(payment.map(|p| p.as_str()))
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        if result.rows_affected() == 0 {
            return Err(BookingError::BookingNotFound(id));
        }
        Ok(())
    }

    async fn release_seats_and_set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;

        sqlx::query("DELETE FROM booked_seats WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;

        let result = sqlx::query(
            "UPDATE bookings SET booking_status = $1, updated_at = $2 \
             WHERE id = $3 AND deleted_at IS NULL",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        if result.rows_affected() == 0 {
            return Err(BookingError::BookingNotFound(id));
        }

        tx.commit().await.map_err(BookingError::storage)?;
        Ok(())
    }

    async fn release_seats_for_ended_session(&self, id: Uuid) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;

        sqlx::query("DELETE FROM booked_seats WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;

        sqlx::query(
            "UPDATE bookings SET booking_status = $1, updated_at = $2 \
             WHERE id = $3 AND deleted_at IS NULL \
             AND booking_status NOT IN ($4, $5)",
        )
        .bind(BookingStatus::Expired.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(BookingStatus::Cancelled.as_str())
        .bind(BookingStatus::Expired.as_str())
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        tx.commit().await.map_err(BookingError::storage)?;
        Ok(())
    }

    async fn held_seats(
        &self,
        session_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, BookingError> {
        if seat_ids.is_empty() {
            return Ok(Vec::new());
        }

        sqlx::query_scalar(
            "SELECT DISTINCT bs.seat_id FROM booked_seats bs \
             JOIN bookings b ON b.id = bs.booking_id \
             WHERE bs.session_id = $1 \
             AND b.booking_status IN ($2, $3) \
             AND b.deleted_at IS NULL \
             AND bs.seat_id = ANY($4) \
             ORDER BY bs.seat_id",
        )
        .bind(session_id)
        .bind(BookingStatus::Pending.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .bind(seat_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::storage)
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE booking_status = $1 AND expires_at < $2 AND deleted_at IS NULL"
        ))
        .bind(BookingStatus::Pending.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        // Sweeps only need the booking itself, not its seats.
        rows.into_iter()
            .map(|row| row.into_booking(Vec::new()))
            .collect()
    }

    async fn find_for_ended_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let rows: Vec<BookingRow> = sqlx::query_as(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE session_end_time < $1 AND booking_status IN ($2, $3) \
             AND deleted_at IS NULL"
        ))
        .bind(now)
        .bind(BookingStatus::Pending.as_str())
        .bind(BookingStatus::Confirmed.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(BookingError::storage)?;

        rows.into_iter()
            .map(|row| row.into_booking(Vec::new()))
            .collect()
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        let mut tx = self.pool.begin().await.map_err(BookingError::storage)?;

        sqlx::query("DELETE FROM booked_seats WHERE booking_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(BookingError::storage)?;

        let result = sqlx::query(
            "UPDATE bookings SET deleted_at = $1, updated_at = $1 \
             WHERE id = $2 AND deleted_at IS NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(BookingError::storage)?;

        if result.rows_affected() == 0 {
            return Err(BookingError::BookingNotFound(id));
        }

        tx.commit().await.map_err(BookingError::storage)?;
        Ok(())
    }
}
