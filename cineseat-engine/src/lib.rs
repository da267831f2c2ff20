pub mod conflict;
pub mod memory;
pub mod service;
pub mod sweeper;

pub use conflict::SeatConflictChecker;
pub use memory::MemoryBookingRepository;
pub use service::BookingService;
