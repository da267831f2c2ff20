use std::sync::Arc;

use uuid::Uuid;

use cineseat_domain::error::BookingError;
use cineseat_domain::repository::BookingRepository;

/// Optimistic pre-check for seat conflicts.
///
/// Returns the subset of candidate seats already held by a non-terminal
/// booking for the session. This produces a fast, friendly rejection before
/// the create transaction attempts the write; the store-level uniqueness on
/// (session, seat) remains the authoritative resolver under races.
pub struct SeatConflictChecker {
    repo: Arc<dyn BookingRepository>,
}

impl SeatConflictChecker {
    pub fn new(repo: Arc<dyn BookingRepository>) -> Self {
        Self { repo }
    }

    pub async fn check_held(
        &self,
        session_id: Uuid,
        seat_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, BookingError> {
        if seat_ids.is_empty() {
            return Ok(Vec::new());
        }
        self.repo.held_seats(session_id, seat_ids).await
    }
}
