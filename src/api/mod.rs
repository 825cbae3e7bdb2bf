//! JSON over HTTP. Handlers are thin: parse, call the engine, map errors.

mod amenities;
mod bookings;
pub mod dto;
mod error;
mod guests;
mod rooms;

pub use error::ApiError;

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::seed::Dataset;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub dataset: Arc<Dataset>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    rooms: usize,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        rooms: state.engine.room_count(),
    })
}

async fn track_metrics(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| "unmatched".to_string(), |p| p.as_str().to_string());

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    metrics::counter!(
        crate::observability::HTTP_REQUESTS_TOTAL,
        "method" => method.clone(),
        "route" => route.clone(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        crate::observability::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method,
        "route" => route
    )
    .record(started.elapsed().as_secs_f64());
    response
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/pricing/calculate", get(rooms::calculate_price))
        // Bookings
        .route("/bookings", post(bookings::create_booking).get(bookings::list_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/dates", put(bookings::change_dates))
        .route("/bookings/:id/status", put(bookings::change_status))
        .route("/bookings/:id/cancel", post(bookings::cancel_booking))
        .route("/bookings/:id/keys", post(amenities::issue_key).get(amenities::list_keys))
        .route(
            "/bookings/:id/concierge",
            post(amenities::reserve).get(amenities::list_reservations),
        )
        // Rooms
        .route("/rooms", get(rooms::list_rooms).post(rooms::add_room))
        .route("/rooms/available", get(rooms::available_rooms))
        .route("/rooms/quote", get(rooms::quote))
        .route("/rooms/:id", get(rooms::get_room).put(rooms::update_room))
        // Guests
        .route("/guests", get(guests::list_guests).post(guests::register_guest))
        .route("/guests/:id", get(guests::get_guest))
        .route("/guests/:id/loyalty", get(guests::loyalty))
        .route("/guests/:id/loyalty/redeem", post(guests::redeem))
        .route(
            "/guests/:id/preferences",
            get(guests::get_preferences).put(guests::set_preferences),
        )
        .route("/users", get(guests::list_users))
        // Amenities
        .route("/keys/validate", get(amenities::check_key))
        .route("/keys/:id/revoke", post(amenities::revoke_key))
        .route("/concierge/services", get(amenities::list_services))
        .route("/concierge/:id/status", put(amenities::change_reservation_status));

    Router::new()
        .route("/health", get(health))
        .nest("/api", api)
        .route_layer(middleware::from_fn(track_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves; in-flight requests are drained first.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
