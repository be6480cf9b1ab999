//! Coffees endpoints

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

/// GET /coffees
pub async fn list_coffees(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
) -> Result<Json<Vec<CoffeeResponse>>, AppError> {
    let coffees = state.db.list_coffees().await?;

    let mut response = Vec::with_capacity(coffees.len());
    for coffee in &coffees {
        response.push(coffee_to_response(&state.db, coffee).await?);
    }

    Ok(Json(response))
}

/// POST /coffees
pub async fn create_coffee(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    WithRejection(Json(req), _): JsonBody<CreateCoffeeRequest>,
) -> Result<(StatusCode, Json<CoffeeResponse>), AppError> {
    let (Some(name), Some(cafe_id)) = (required_text(req.name.as_deref()), req.cafe_id) else {
        return Err(AppError::Validation(
            "Name and cafe_id are required".to_string(),
        ));
    };

    if state.db.get_cafe(cafe_id).await?.is_none() {
        return Err(AppError::not_found("Cafe not found"));
    }

    let description = req.description.as_deref().unwrap_or_default();
    let coffee = state.db.insert_coffee(name, description, cafe_id).await?;
    tracing::info!(coffee_id = coffee.id, cafe_id, user_id, "Coffee created");

    Ok((
        StatusCode::CREATED,
        Json(coffee_to_response(&state.db, &coffee).await?),
    ))
}

/// GET /coffees/:id
pub async fn get_coffee(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<CoffeeResponse>, AppError> {
    let coffee = state
        .db
        .get_coffee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Coffee not found"))?;

    Ok(Json(coffee_to_response(&state.db, &coffee).await?))
}

/// PATCH /coffees/:id
pub async fn update_coffee(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(id): Path<i64>,
    WithRejection(Json(req), _): JsonBody<UpdateCoffeeRequest>,
) -> Result<Json<CoffeeResponse>, AppError> {
    let mut coffee = state
        .db
        .get_coffee(id)
        .await?
        .ok_or_else(|| AppError::not_found("Coffee not found"))?;

    if let Some(name) = req.name {
        coffee.name = name;
    }
    if let Some(description) = req.description {
        coffee.description = description;
    }
    state.db.update_coffee(&coffee).await?;

    Ok(Json(coffee_to_response(&state.db, &coffee).await?))
}

/// DELETE /coffees/:id
pub async fn delete_coffee(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_coffee(id).await? {
        return Err(AppError::not_found("Coffee not found"));
    }

    tracing::info!(coffee_id = id, user_id, "Coffee deleted");
    Ok(Json(MessageResponse::new("Coffee deleted successfully")))
}
