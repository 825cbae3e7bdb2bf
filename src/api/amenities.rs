use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use ulid::Ulid;

use super::dto::*;
use super::error::{ApiError, ApiJson, ApiQuery, parse_id};
use super::AppState;

/// POST /api/bookings/:id/keys
pub async fn issue_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<KeyView>), ApiError> {
    let key = state.engine.issue_digital_key(Ulid::new(), parse_id(&id)?).await?;
    Ok((StatusCode::CREATED, Json(key.into())))
}

/// GET /api/bookings/:id/keys
pub async fn list_keys(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Vec<KeyView>>, ApiError> {
    let keys = state.engine.list_digital_keys(parse_id(&id)?)?;
    Ok(Json(keys.into_iter().map(KeyView::from).collect()))
}

/// POST /api/keys/:id/revoke
pub async fn revoke_key(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<KeyView>, ApiError> {
    Ok(Json(state.engine.revoke_digital_key(parse_id(&id)?).await?.into()))
}

/// GET /api/keys/validate?code=&date=
pub async fn check_key(State(state): State<AppState>, ApiQuery(q): ApiQuery<KeyCheckQuery>) -> Json<KeyCheckView> {
    let date = q.date.unwrap_or_else(|| chrono::Utc::now().date_naive());
    Json(KeyCheckView {
        valid: state.engine.validate_digital_key(&q.code, date),
        date,
    })
}

/// GET /api/concierge/services
pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceView>> {
    Json(
        state
            .engine
            .list_concierge_services()
            .into_iter()
            .map(ServiceView::from)
            .collect(),
    )
}

/// POST /api/bookings/:id/concierge
pub async fn reserve(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ConciergeRequest>,
) -> Result<(StatusCode, Json<ReservationView>), ApiError> {
    let reservation = state
        .engine
        .reserve_concierge(Ulid::new(), parse_id(&id)?, req.service_id, req.scheduled_for, req.party_size)
        .await?;
    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// GET /api/bookings/:id/concierge
pub async fn list_reservations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<ReservationView>>, ApiError> {
    let list = state.engine.list_concierge_reservations(parse_id(&id)?)?;
    Ok(Json(list.into_iter().map(ReservationView::from).collect()))
}

/// PUT /api/concierge/:id/status
pub async fn change_reservation_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ChangeStatusRequest>,
) -> Result<Json<ReservationView>, ApiError> {
    let reservation = state
        .engine
        .update_concierge_status(parse_id(&id)?, &req.status)
        .await?;
    Ok(Json(reservation.into()))
}
