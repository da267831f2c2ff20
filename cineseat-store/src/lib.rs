pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod events;
pub mod session_client;

pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use events::EventProducer;
pub use session_client::HttpSessionClient;
