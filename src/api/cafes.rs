//! Cafes endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_extra::extract::WithRejection;

use super::{JsonBody, converters::*, dto::*, required_text};
use crate::AppState;
use crate::auth::CurrentUser;
use crate::error::AppError;

/// GET /cafes
pub async fn list_cafes(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
) -> Result<Json<Vec<CafeResponse>>, AppError> {
    let cafes = state.db.list_cafes().await?;

    let mut response = Vec::with_capacity(cafes.len());
    for cafe in &cafes {
        response.push(cafe_to_response(&state.db, cafe).await?);
    }

    Ok(Json(response))
}

/// POST /cafes
pub async fn create_cafe(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    WithRejection(Json(req), _): JsonBody<CreateCafeRequest>,
) -> Result<(StatusCode, Json<CafeResponse>), AppError> {
    let (Some(name), Some(location)) = (
        required_text(req.name.as_deref()),
        required_text(req.location.as_deref()),
    ) else {
        return Err(AppError::Validation(
            "Name and location are required".to_string(),
        ));
    };

    let cafe = state.db.insert_cafe(name, location).await?;
    tracing::info!(cafe_id = cafe.id, user_id, "Cafe created");

    Ok((
        StatusCode::CREATED,
        Json(cafe_to_response(&state.db, &cafe).await?),
    ))
}

/// GET /cafes/:id
pub async fn get_cafe(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<CafeResponse>, AppError> {
    let cafe = state
        .db
        .get_cafe(id)
        .await?
        .ok_or_else(|| AppError::not_found("Cafe not found"))?;

    Ok(Json(cafe_to_response(&state.db, &cafe).await?))
}

/// PATCH /cafes/:id
pub async fn update_cafe(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<i64>,
    WithRejection(Json(req), _): JsonBody<UpdateCafeRequest>,
) -> Result<Json<CafeResponse>, AppError> {
    let mut cafe = state
        .db
        .get_cafe(id)
        .await?
        .ok_or_else(|| AppError::not_found("Cafe not found"))?;

    if let Some(name) = req.name {
        cafe.name = name;
    }
    if let Some(location) = req.location {
        cafe.location = location;
    }
    state.db.update_cafe(&cafe).await?;

    Ok(Json(cafe_to_response(&state.db, &cafe).await?))
}

/// DELETE /cafes/:id
///
/// Coffees of the cafe and their notes go with it.
pub async fn delete_cafe(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_cafe(id).await? {
        return Err(AppError::not_found("Cafe not found"));
    }

    tracing::info!(cafe_id = id, user_id, "Cafe deleted");
    Ok(Json(MessageResponse::new("Cafe deleted successfully")))
}
