use uuid::Uuid;

/// Error taxonomy for the reservation lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("session already started: {0}")]
    SessionAlreadyStarted(Uuid),

    #[error("session service unavailable: {0}")]
    SessionUnavailable(String),

    #[error("seats already booked: {0:?}")]
    SeatsAlreadyBooked(Vec<Uuid>),

    #[error("booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("the reservation time has expired")]
    BookingExpired,

    #[error("booking already cancelled")]
    AlreadyCancelled,

    #[error("booking already confirmed")]
    AlreadyConfirmed,

    #[error("invalid booking status: {0}")]
    InvalidStatus(String),

    #[error("at least one seat must be requested")]
    NoSeatsRequested,

    #[error("storage failure: {0}")]
    Storage(String),
}

impl BookingError {
    /// Wraps an underlying store error without leaking its type upward.
    pub fn storage(err: impl std::fmt::Display) -> Self {
        BookingError::Storage(err.to_string())
    }
}
