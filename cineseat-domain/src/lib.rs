pub mod booking;
pub mod error;
pub mod events;
pub mod repository;
pub mod session;

pub use booking::{BookedSeat, Booking, BookingStatus, PaymentStatus};
pub use error::BookingError;
pub use events::BookingStateEvent;
pub use session::Session;
