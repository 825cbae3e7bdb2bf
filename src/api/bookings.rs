use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ulid::Ulid;

use crate::engine::BookingFilter;

use super::dto::*;
use super::error::{ApiError, ApiJson, ApiQuery, parse_id};
use super::AppState;

/// POST /api/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), ApiError> {
    let range = stay(req.checkin, req.checkout)?;
    let booking = state
        .engine
        .create_booking(Ulid::new(), req.guest_id, req.room_id, range)
        .await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /api/bookings?guestId=&roomId=
pub async fn list_bookings(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<BookingListQuery>,
) -> Json<Vec<BookingView>> {
    let filter = BookingFilter {
        guest_id: q.guest_id,
        room_id: q.room_id,
    };
    let bookings = state.engine.list_bookings(filter).await;
    Json(bookings.into_iter().map(BookingView::from).collect())
}

/// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state.engine.get_booking(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}

/// PUT /api/bookings/:id/dates
pub async fn change_dates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ChangeDatesRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let range = stay(req.checkin, req.checkout)?;
    let booking = state
        .engine
        .update_booking_dates(parse_id(&id)?, range)
        .await?;
    Ok(Json(booking.into()))
}

/// PUT /api/bookings/:id/status
pub async fn change_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ChangeStatusRequest>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state
        .engine
        .update_booking_status(parse_id(&id)?, &req.status)
        .await?;
    Ok(Json(booking.into()))
}

/// POST /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookingView>, ApiError> {
    let booking = state.engine.cancel_booking(parse_id(&id)?).await?;
    Ok(Json(booking.into()))
}
