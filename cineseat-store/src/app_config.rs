use std::env;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub session_service: SessionServiceConfig,
    pub booking_rules: BookingRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String {
    "bookings".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionServiceConfig {
    pub base_url: String,
    #[serde(default = "default_session_timeout")]
    pub timeout_seconds: u64,
}

fn default_session_timeout() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    /// How long a pending booking holds its seats without payment.
    #[serde(default = "default_hold_minutes")]
    pub hold_minutes: i64,
    /// Cadence of both background sweepers.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

fn default_hold_minutes() -> i64 {
    15
}

fn default_sweep_interval() -> u64 {
    60
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Start off by merging in the "default" configuration file
            .add_source(config::File::with_name("config/default"))
            // Layer the per-environment file on top (optional)
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Environment variables win, e.g. CINESEAT__DATABASE__URL
            .add_source(config::Environment::with_prefix("CINESEAT").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
