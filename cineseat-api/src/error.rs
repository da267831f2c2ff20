use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use cineseat_domain::error::BookingError;

#[derive(Debug)]
pub struct AppError(pub BookingError);

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self.0 {
            BookingError::BookingNotFound(_) | BookingError::SessionNotFound(_) => {
                (StatusCode::NOT_FOUND, self.0.to_string())
            }
            BookingError::SeatsAlreadyBooked(_)
            | BookingError::BookingExpired
            | BookingError::AlreadyCancelled
            | BookingError::AlreadyConfirmed => (StatusCode::CONFLICT, self.0.to_string()),
            BookingError::NoSeatsRequested | BookingError::SessionAlreadyStarted(_) => {
                (StatusCode::BAD_REQUEST, self.0.to_string())
            }
            BookingError::SessionUnavailable(_)
            | BookingError::InvalidStatus(_)
            | BookingError::Storage(_) => {
                tracing::error!("Internal Server Error: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
