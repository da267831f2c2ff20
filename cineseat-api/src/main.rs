use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cineseat_api::{app, AppState};
use cineseat_engine::{sweeper, BookingService};
use cineseat_store::{DbClient, EventProducer, HttpSessionClient, PgBookingRepository};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cineseat=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cineseat_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting cineseat API on port {}", config.server.port);

    let db = DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to database");
    db.migrate().await.expect("Failed to run migrations");
    let repo = Arc::new(PgBookingRepository::new(db.pool.clone()));

    let sessions = HttpSessionClient::new(
        &config.session_service.base_url,
        Duration::from_secs(config.session_service.timeout_seconds),
    )
    .expect("Failed to build session client");

    let publisher = EventProducer::new(&config.kafka.brokers, &config.kafka.topic)
        .expect("Failed to create Kafka producer");

    let service = Arc::new(BookingService::new(
        repo,
        Arc::new(sessions),
        Arc::new(publisher),
        chrono::Duration::minutes(config.booking_rules.hold_minutes),
    ));

    let sweep_period = Duration::from_secs(config.booking_rules.sweep_interval_seconds);
    tokio::spawn(sweeper::run_expiration_sweeper(service.clone(), sweep_period));
    tokio::spawn(sweeper::run_ended_session_sweeper(
        service.clone(),
        sweep_period,
    ));

    let app = app(AppState { service });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server address");
    axum::serve(listener, app).await.expect("Server error");
}
