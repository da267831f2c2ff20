use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use cineseat_domain::error::BookingError;
use cineseat_domain::repository::SessionClient;
use cineseat_domain::session::Session;

/// HTTP client for the cinema catalog's session lookup. The short request
/// timeout bounds how long a create can block on the collaborator.
pub struct HttpSessionClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl HttpSessionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SessionClient for HttpSessionClient {
    async fn get_session(&self, session_id: Uuid) -> Result<Session, BookingError> {
        let url = format!("{}/sessions/{}", self.base_url, session_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BookingError::SessionUnavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BookingError::SessionNotFound(session_id));
        }
        if !response.status().is_success() {
            return Err(BookingError::SessionUnavailable(format!(
                "cinema service returned status {} for session {}",
                response.status(),
                session_id
            )));
        }

        let body: SessionResponse = response
            .json()
            .await
            .map_err(|e| BookingError::SessionUnavailable(e.to_string()))?;

        Ok(Session {
            id: session_id,
            start_time: body.start_time,
            end_time: body.end_time,
        })
    }
}
