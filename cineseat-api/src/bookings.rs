use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use cineseat_domain::booking::Booking;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub seat_ids: Vec<Uuid>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bookings", post(create).get(list))
        .route("/bookings/{id}", get(get_by_id).delete(remove))
        .route("/bookings/{id}/confirm", post(confirm))
        .route("/bookings/{id}/cancel", post(cancel))
}

async fn create(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<Json<Booking>, AppError> {
    info!(
        session_id = %req.session_id,
        user_id = %req.user_id,
        seats = req.seat_ids.len(),
        "creating booking"
    );
    let booking = state
        .service
        .create(req.session_id, req.user_id, req.seat_ids)
        .await?;
    Ok(Json(booking))
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<Booking>>, AppError> {
    let bookings = state.service.list().await?;
    Ok(Json(bookings))
}

async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.get(id).await?;
    Ok(Json(booking))
}

async fn confirm(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.confirm(id).await?;
    info!(booking_id = %id, "booking confirmed");
    Ok(Json(booking))
}

async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    let booking = state.service.cancel(id).await?;
    info!(booking_id = %id, "booking cancelled");
    Ok(Json(booking))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.service.delete(id).await?;
    info!(booking_id = %id, "booking deleted");
    Ok(StatusCode::NO_CONTENT)
}
