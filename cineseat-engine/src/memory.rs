use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use cineseat_domain::booking::{BookedSeat, Booking, BookingStatus, PaymentStatus};
use cineseat_domain::error::BookingError;
use cineseat_domain::repository::BookingRepository;

/// In-memory booking store used by tests and local development.
///
/// A single mutex stands in for the database transaction: every repository
/// call runs to completion under the lock, so the same atomicity the
/// Postgres implementation gets from its transactions holds here, including
/// the conflict check inside `create_with_seats`.
pub struct MemoryBookingRepository {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl MemoryBookingRepository {
    pub fn new() -> Self {
        Self {
            bookings: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBookingRepository {
    fn default() -> Self {
        Self::new()
    }
}

fn held_in(bookings: &HashMap<Uuid, Booking>, session_id: Uuid, seat_ids: &[Uuid]) -> Vec<Uuid> {
    let mut held: Vec<Uuid> = bookings
        .values()
        .filter(|b| {
            b.session_id == session_id
                && !b.booking_status.is_terminal()
                && b.deleted_at.is_none()
        })
        .flat_map(|b| b.seats.iter().map(|s| s.seat_id))
        .filter(|seat_id| seat_ids.contains(seat_id))
        .collect();
    held.sort();
    held.dedup();
    held
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn create_with_seats(
        &self,
        booking: &Booking,
        seat_ids: &[Uuid],
    ) -> Result<Booking, BookingError> {
        let mut bookings = self.bookings.lock().await;

        // Authoritative conflict check, the analogue of the unique index.
        let held = held_in(&bookings, booking.session_id, seat_ids);
        if !held.is_empty() {
            return Err(BookingError::SeatsAlreadyBooked(held));
        }

        let mut stored = booking.clone();
        stored.seats = seat_ids
            .iter()
            .map(|seat_id| BookedSeat {
                id: Uuid::new_v4(),
                booking_id: booking.id,
                seat_id: *seat_id,
            })
            .collect();
        bookings.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        let bookings = self.bookings.lock().await;
        bookings
            .get(&id)
            .filter(|b| b.deleted_at.is_none())
            .cloned()
            .ok_or(BookingError::BookingNotFound(id))
    }

    async fn list(&self) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().await;
        let mut all: Vec<Booking> = bookings
            .values()
            .filter(|b| b.deleted_at.is_none())
            .cloned()
            .collect();
        all.sort_by_key(|b| b.created_at);
        Ok(all)
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(BookingError::BookingNotFound(id))?;
        booking.booking_status = status;
        if let Some(payment) = payment {
            booking.payment_status = payment;
        }
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn release_seats_and_set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(BookingError::BookingNotFound(id))?;
        booking.seats.clear();
        booking.booking_status = status;
        booking.updated_at = Utc::now();
        Ok(())
    }

    async fn release_seats_for_ended_session(&self, id: Uuid) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(BookingError::BookingNotFound(id))?;
        booking.seats.clear();
        if !booking.booking_status.is_terminal() {
            booking.booking_status = BookingStatus::Expired;
            booking.updated_at = Utc::now();
        }
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
        let bookings = self.bookings.lock().await;
        Ok(held_in(&bookings, session_id, seat_ids))
    }

    async fn find_expired_pending(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .values()
            .filter(|b| {
                b.booking_status == BookingStatus::Pending
                    && b.expires_at < now
                    && b.deleted_at.is_none()
            })
            .cloned()
            .collect())
    }

    async fn find_for_ended_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError> {
        let bookings = self.bookings.lock().await;
        Ok(bookings
            .values()
            .filter(|b| {
                !b.booking_status.is_terminal()
                    && b.session_end_time < now
                    && b.deleted_at.is_none()
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        let mut bookings = self.bookings.lock().await;
        let booking = bookings
            .get_mut(&id)
            .filter(|b| b.deleted_at.is_none())
            .ok_or(BookingError::BookingNotFound(id))?;
        booking.seats.clear();
        booking.deleted_at = Some(Utc::now());
        Ok(())
    }
}
