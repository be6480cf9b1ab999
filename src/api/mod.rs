//! API layer
//!
//! HTTP handlers for:
//! - Cafes, coffees and notes (session required)
//! - Metrics (Prometheus)

mod cafes;
mod coffees;
mod converters;
mod dto;
pub mod metrics;
mod notes;

use axum::{Json, Router, middleware, routing::get};
use axum_extra::extract::WithRejection;

use crate::AppState;
use crate::auth::require_auth;
use crate::error::AppError;

pub use converters::*;
pub use dto::*;
pub use metrics::metrics_router;

/// JSON request body whose rejections answer with an `AppError` body
pub type JsonBody<T> = WithRejection<Json<T>, AppError>;

/// Create the resource router
///
/// Every route requires a logged-in session.
pub fn resource_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/cafes", get(cafes::list_cafes).post(cafes::create_cafe))
        .route(
            "/cafes/:id",
            get(cafes::get_cafe)
                .patch(cafes::update_cafe)
                .delete(cafes::delete_cafe),
        )
        .route(
            "/coffees",
            get(coffees::list_coffees).post(coffees::create_coffee),
        )
        .route(
            "/coffees/:id",
            get(coffees::get_coffee)
                .patch(coffees::update_coffee)
                .delete(coffees::delete_coffee),
        )
        .route("/notes", get(notes::list_notes).post(notes::create_note))
        .route(
            "/notes/:id",
            get(notes::get_note)
                .patch(notes::update_note)
                .delete(notes::delete_note),
        )
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

/// Trimmed, non-empty text or None
fn required_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}
