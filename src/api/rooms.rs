use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::RoomType;
use crate::pricing::{self, PricingResponse};

use super::dto::*;
use super::error::{ApiError, ApiJson, ApiQuery, parse_id};
use super::AppState;

fn parse_room_type(raw: &str) -> Result<RoomType, ApiError> {
    raw.parse().map_err(|e: crate::model::UnknownVariant| ApiError::bad_request(e.to_string()))
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("missing query parameter: {name}")))
}

fn date(raw: &str, name: &str) -> Result<NaiveDate, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("{name} must be YYYY-MM-DD, got {raw}")))
}

/// GET /api/pricing/calculate?roomType=&checkin=&checkout=
pub async fn calculate_price(ApiQuery(q): ApiQuery<PricingQuery>) -> Result<Json<PricingResponse>, ApiError> {
    let room_type = required(&q.room_type, "roomType")?;
    let check_in = date(required(&q.checkin, "checkin")?, "checkin")?;
    let check_out = date(required(&q.checkout, "checkout")?, "checkout")?;
    let result = pricing::calculate_for(room_type, check_in, check_out)?;
    Ok(Json(PricingResponse::from(&result)))
}

/// GET /api/rooms/quote?roomType=&checkin=&checkout=
pub async fn quote(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<PricingQuery>,
) -> Result<Json<QuoteView>, ApiError> {
    let room_type = parse_room_type(required(&q.room_type, "roomType")?)?;
    let check_in = date(required(&q.checkin, "checkin")?, "checkin")?;
    let check_out = date(required(&q.checkout, "checkout")?, "checkout")?;
    let quote = state.engine.quote(room_type, &stay(check_in, check_out)?).await?;
    Ok(Json(quote.into()))
}

/// GET /api/rooms/available?checkin=&checkout=&roomType=&guests=
pub async fn available_rooms(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<AvailabilityQuery>,
) -> Result<Json<Vec<RoomView>>, ApiError> {
    let range = stay(q.checkin, q.checkout)?;
    let room_type = q.room_type.as_deref().map(parse_room_type).transpose()?;
    let rooms = state.engine.search_available(range, room_type, q.guests).await?;
    Ok(Json(rooms.into_iter().map(RoomView::from).collect()))
}

/// GET /api/rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<Vec<RoomView>> {
    let rooms = state.engine.list_rooms().await;
    Json(rooms.into_iter().map(RoomView::from).collect())
}

/// GET /api/rooms/:id
pub async fn get_room(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<RoomView>, ApiError> {
    let room = state.engine.get_room(parse_id(&id)?).await?;
    Ok(Json(room.into()))
}

/// POST /api/rooms
pub async fn add_room(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<AddRoomRequest>,
) -> Result<(StatusCode, Json<RoomView>), ApiError> {
    let room = state
        .engine
        .add_room(Ulid::new(), req.number, parse_room_type(&req.room_type)?, req.capacity)
        .await?;
    Ok((StatusCode::CREATED, Json(room.into())))
}

/// PUT /api/rooms/:id
pub async fn update_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateRoomRequest>,
) -> Result<Json<RoomView>, ApiError> {
    let room = state
        .engine
        .update_room(parse_id(&id)?, parse_room_type(&req.room_type)?, req.capacity)
        .await?;
    Ok(Json(room.into()))
}
