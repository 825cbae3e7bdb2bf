use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ulid::Ulid;

use crate::model::StayPreference;

use super::dto::*;
use super::error::{ApiError, ApiJson, parse_id};
use super::AppState;

/// GET /api/guests
pub async fn list_guests(State(state): State<AppState>) -> Json<Vec<GuestView>> {
    Json(state.engine.list_guests().into_iter().map(GuestView::from).collect())
}

/// POST /api/guests
pub async fn register_guest(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterGuestRequest>,
) -> Result<(StatusCode, Json<GuestView>), ApiError> {
    let guest = state
        .engine
        .register_guest(Ulid::new(), req.name, req.email)
        .await?;
    Ok((StatusCode::CREATED, Json(guest.into())))
}

/// GET /api/guests/:id
pub async fn get_guest(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<GuestView>, ApiError> {
    Ok(Json(state.engine.get_guest(parse_id(&id)?)?.into()))
}

/// GET /api/guests/:id/loyalty
pub async fn loyalty(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<LoyaltyView>, ApiError> {
    Ok(Json(state.engine.loyalty_account(parse_id(&id)?)?.into()))
}

/// POST /api/guests/:id/loyalty/redeem
pub async fn redeem(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RedeemRequest>,
) -> Result<Json<LoyaltyView>, ApiError> {
    let account = state.engine.redeem_points(parse_id(&id)?, req.points).await?;
    Ok(Json(account.into()))
}

/// GET /api/guests/:id/preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PreferencesView>, ApiError> {
    let guest_id = parse_id(&id)?;
    state
        .engine
        .get_preferences(guest_id)?
        .map(|p| Json(p.into()))
        .ok_or_else(|| ApiError::not_found(format!("no preferences saved for guest {guest_id}")))
}

/// PUT /api/guests/:id/preferences
pub async fn set_preferences(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PreferencesRequest>,
) -> Result<Json<PreferencesView>, ApiError> {
    let preference = StayPreference {
        guest_id: parse_id(&id)?,
        bed: req.bed,
        floor: req.floor,
        quiet_room: req.quiet_room,
        notes: req.notes,
    };
    Ok(Json(state.engine.set_preferences(preference).await?.into()))
}

/// GET /api/users: the read-only demo directory.
pub async fn list_users(State(state): State<AppState>) -> Json<Vec<UserView>> {
    Json(state.dataset.users.iter().map(UserView::from).collect())
}
