use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::booking::{Booking, BookingStatus};

/// Event emitted to the bus after a booking commits a confirm or cancel.
/// Fire and forget: a failed publish is logged and never rolls the state
/// change back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingStateEvent {
    pub booking_id: Uuid,
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub booking_status: BookingStatus,
}

impl BookingStateEvent {
    pub fn from_booking(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id,
            session_id: booking.session_id,
            user_id: booking.user_id,
            booking_status: booking.booking_status,
        }
    }
}
