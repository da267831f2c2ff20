use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use cineseat_domain::booking::{Booking, BookingStatus, PaymentStatus};
use cineseat_domain::error::BookingError;
use cineseat_domain::events::BookingStateEvent;
use cineseat_domain::repository::{BookingRepository, EventPublisher, SessionClient};

use crate::conflict::SeatConflictChecker;

/// Orchestrates the booking lifecycle: transactional creation, the
/// confirm/cancel state machine, and the two sweep operations the
/// background workers invoke.
pub struct BookingService {
    repo: Arc<dyn BookingRepository>,
    sessions: Arc<dyn SessionClient>,
    publisher: Arc<dyn EventPublisher>,
    conflicts: SeatConflictChecker,
    hold_duration: Duration,
}

impl BookingService {
    pub fn new(
        repo: Arc<dyn BookingRepository>,
        sessions: Arc<dyn SessionClient>,
        publisher: Arc<dyn EventPublisher>,
        hold_duration: Duration,
    ) -> Self {
        let conflicts = SeatConflictChecker::new(repo.clone());
        Self {
            repo,
            sessions,
            publisher,
            conflicts,
            hold_duration,
        }
    }

    /// Creates a pending booking holding the requested seats.
    ///
    /// Validates the session (must exist and start strictly in the future),
    /// pre-checks the seats for conflicts, then persists the booking and
    /// its seat rows in one transaction. No partial booking survives a
    /// failure at any step.
    pub async fn create(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        seat_ids: Vec<Uuid>,
    ) -> Result<Booking, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::NoSeatsRequested);
        }
        let mut seen = HashSet::new();
        let seat_ids: Vec<Uuid> = seat_ids.into_iter().filter(|s| seen.insert(*s)).collect();

        let session = self.sessions.get_session(session_id).await?;

        let now = Utc::now();
        if session.start_time <= now {
            return Err(BookingError::SessionAlreadyStarted(session_id));
        }

        let held = self.conflicts.check_held(session_id, &seat_ids).await?;
        if !held.is_empty() {
            return Err(BookingError::SeatsAlreadyBooked(held));
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            session_id,
            user_id,
            booking_status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            expires_at: now + self.hold_duration,
            session_start_time: session.start_time,
            session_end_time: session.end_time,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            seats: Vec::new(),
        };

        let created = self.repo.create_with_seats(&booking, &seat_ids).await?;
        info!(
            booking_id = %created.id,
            session_id = %session_id,
            user_id = %user_id,
            seats = seat_ids.len(),
            "booking created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: Uuid) -> Result<Booking, BookingError> {
        self.repo.get(id).await
    }

    pub async fn list(&self) -> Result<Vec<Booking>, BookingError> {
        self.repo.list().await
    }

    /// Administrative soft delete. Not part of the lifecycle state machine.
    pub async fn delete(&self, id: Uuid) -> Result<(), BookingError> {
        self.repo.delete(id).await
    }

    /// pending → confirmed. The hold deadline is checked before the status
    /// switch, so a stale pending booking is rejected as expired instead of
    /// silently confirming.
    pub async fn confirm(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.repo.get(id).await?;

        if booking.expires_at <= Utc::now() {
            return Err(BookingError::BookingExpired);
        }

        match booking.booking_status {
            BookingStatus::Expired => Err(BookingError::BookingExpired),
            BookingStatus::Cancelled => Err(BookingError::AlreadyCancelled),
            BookingStatus::Confirmed => Err(BookingError::AlreadyConfirmed),
            BookingStatus::Pending => {
                self.repo
                    .set_status(id, BookingStatus::Confirmed, Some(PaymentStatus::Paid))
                    .await?;
                let confirmed = self.repo.get(id).await?;
                self.notify(&confirmed).await;
                Ok(confirmed)
            }
        }
    }

    /// pending → cancelled, freeing the seats in the same transaction.
    /// Confirmed bookings are rejected; the ended-session sweep is the only
    /// path that releases a confirmed booking's seats.
    pub async fn cancel(&self, id: Uuid) -> Result<Booking, BookingError> {
        let booking = self.repo.get(id).await?;

        match booking.booking_status {
            BookingStatus::Expired => Err(BookingError::BookingExpired),
            BookingStatus::Cancelled => Err(BookingError::AlreadyCancelled),
            BookingStatus::Confirmed => Err(BookingError::AlreadyConfirmed),
            BookingStatus::Pending => {
                self.repo
                    .release_seats_and_set_status(id, BookingStatus::Cancelled)
                    .await?;
                let cancelled = self.repo.get(id).await?;
                self.notify(&cancelled).await;
                Ok(cancelled)
            }
        }
    }

    /// Cancels every pending booking whose hold deadline has passed, then
    /// overwrites its status to expired so it stays distinguishable from a
    /// user-initiated cancellation. Per-booking failures are logged and
    /// skipped. Idempotent: a second run with nothing newly expired is a
    /// no-op.
    pub async fn expire_old_bookings(&self) -> Result<(), BookingError> {
        let expired = self.repo.find_expired_pending(Utc::now()).await?;
        if expired.is_empty() {
            return Ok(());
        }

        info!(count = expired.len(), "found expired bookings to cancel");

        for booking in expired {
            if let Err(e) = self.cancel(booking.id).await {
                error!(booking_id = %booking.id, error = %e, "failed to cancel expired booking");
                continue;
            }
            if let Err(e) = self
                .repo
                .set_status(booking.id, BookingStatus::Expired, None)
                .await
            {
                error!(booking_id = %booking.id, error = %e, "failed to mark booking expired");
                continue;
            }
            info!(
                booking_id = %booking.id,
                session_id = %booking.session_id,
                "expired booking cancelled and seats freed"
            );
        }

        Ok(())
    }

    /// Backstop that frees seats once the screening has physically ended,
    /// independent of the hold logic and of payment status. Each booking is
    /// handled in its own transaction.
    pub async fn free_seats_for_ended_sessions(&self) -> Result<(), BookingError> {
        let ended = self.repo.find_for_ended_sessions(Utc::now()).await?;
        if ended.is_empty() {
            return Ok(());
        }

        info!(count = ended.len(), "found bookings for ended sessions");

        for booking in ended {
            if let Err(e) = self.repo.release_seats_for_ended_session(booking.id).await {
                error!(
                    booking_id = %booking.id,
                    session_id = %booking.session_id,
                    error = %e,
                    "failed to free seats for ended session"
                );
                continue;
            }
            info!(
                booking_id = %booking.id,
                session_id = %booking.session_id,
                "seats freed for ended session"
            );
        }

        Ok(())
    }

    async fn notify(&self, booking: &Booking) {
        let event = BookingStateEvent::from_booking(booking);
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(booking_id = %booking.id, error = %e, "failed to publish booking state event");
        }
    }
}
