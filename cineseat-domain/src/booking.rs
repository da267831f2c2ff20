use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::BookingError;

/// A seat reservation for one screening session.
///
/// The booking row itself is never physically deleted by lifecycle
/// operations; only the administrative delete sets `deleted_at`. Seat rows
/// are the availability signal and are removed as soon as the booking
/// leaves a non-terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    /// Hold deadline, set once at creation and never mutated.
    pub expires_at: DateTime<Utc>,
    /// Session timing snapshotted at creation so the sweepers never have to
    /// call back into the session service.
    pub session_start_time: DateTime<Utc>,
    pub session_end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub seats: Vec<BookedSeat>,
}

/// One seat held by a booking. The seat id is an opaque reference owned by
/// the cinema catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookedSeat {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub seat_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }

    /// Parses a stored status. An unrecognized value maps to
    /// [`BookingError::InvalidStatus`] so a malformed row surfaces as a
    /// defensive error instead of a panic.
    pub fn parse(value: &str) -> Result<Self, BookingError> {
        match value {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "expired" => Ok(BookingStatus::Expired),
            other => Err(BookingError::InvalidStatus(other.to_string())),
        }
    }

    /// A booking holds its seats only while non-terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Expired)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Result<Self, BookingError> {
        match value {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(BookingError::InvalidStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
