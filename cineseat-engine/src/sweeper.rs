use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::service::BookingService;

/// Background loop cancelling pending bookings whose hold deadline passed.
/// The first pass runs immediately at startup, then once per `period`.
pub async fn run_expiration_sweeper(service: Arc<BookingService>, period: Duration) {
    info!(period_secs = period.as_secs(), "expired bookings sweeper started");

    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = service.expire_old_bookings().await {
            error!(error = %e, "expiration sweep failed");
        }
    }
}

/// Background loop releasing seats held by bookings whose screening has
/// already ended. Same cadence as the expiration sweeper.
pub async fn run_ended_session_sweeper(service: Arc<BookingService>, period: Duration) {
    info!(period_secs = period.as_secs(), "ended sessions sweeper started");

    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        if let Err(e) = service.free_seats_for_ended_sessions().await {
            error!(error = %e, "ended session sweep failed");
        }
    }
}
