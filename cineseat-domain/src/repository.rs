use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus, PaymentStatus};
use crate::error::BookingError;
use crate::events::BookingStateEvent;
use crate::session::Session;

/// Repository trait for booking data access.
///
/// Each method is a complete atomic unit of work: implementations open and
/// commit their own transaction, and roll it back on every failure path.
/// The engine never holds a transaction across two calls, which is what
/// lets the sweepers process one poison record without blocking the rest.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Inserts the booking together with one seat row per seat id, then
    /// re-reads the populated booking, all in one transaction.
    ///
    /// Under a concurrent race for the same seat the store-level uniqueness
    /// on (session, seat) fires; implementations must surface that as
    /// [`BookingError::SeatsAlreadyBooked`] naming the conflicting ids.
    async fn create_with_seats(
        &self,
        booking: &Booking,
        seat_ids: &[Uuid],
    ) -> Result<Booking, BookingError>;

    /// Fetches a booking with its seats. Soft-deleted rows are invisible.
    async fn get(&self, id: Uuid) -> Result<Booking, BookingError>;

    async fn list(&self) -> Result<Vec<Booking>, BookingError>;

    /// Updates the booking status, and the payment status when given.
    async fn set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        payment: Option<PaymentStatus>,
    ) -> Result<(), BookingError>;

    /// Deletes the booking's seat rows and moves it to `status`, in one
    /// transaction. Used by the cancel transition.
    async fn release_seats_and_set_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<(), BookingError>;

    /// Deletes the booking's seat rows and, only if the booking is still
    /// non-terminal, marks it expired. One transaction; used by the
    /// ended-session sweep.
    async fn release_seats_for_ended_session(&self, id: Uuid) -> Result<(), BookingError>;

    /// Returns the subset of `seat_ids` currently held for the session by a
    /// non-terminal booking. An empty candidate set must short-circuit to an
    /// empty result without querying storage.
    async fn held_seats(
        &self,
        session_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, BookingError>;

    /// Pending bookings whose hold deadline has passed as of `now`.
    async fn find_expired_pending(&self, now: DateTime<Utc>)
        -> Result<Vec<Booking>, BookingError>;

    /// Non-terminal bookings whose snapshotted session end time has passed.
    async fn find_for_ended_sessions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Booking>, BookingError>;

    /// Administrative soft delete; also removes the seat rows so a deleted
    /// booking cannot keep seats held.
    async fn delete(&self, id: Uuid) -> Result<(), BookingError>;
}

/// Read-only client for the cinema catalog's session lookup.
#[async_trait]
pub trait SessionClient: Send + Sync {
    async fn get_session(&self, session_id: Uuid) -> Result<Session, BookingError>;
}

/// Outbound hook for booking-state events. Injected into the engine rather
/// than reached through a global writer handle so initialization and
/// teardown stay explicit and testable.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        event: &BookingStateEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
