//! Notes endpoints
//!
//! Every query is scoped to the caller: another user's note is reported as
//! not found.

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

/// GET /notes
pub async fn list_notes(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<NoteResponse>>, AppError> {
    let notes = state.db.list_notes_by_user(user_id).await?;
    Ok(Json(notes.iter().map(note_to_response).collect()))
}

/// POST /notes
pub async fn create_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    WithRejection(Json(req), _): JsonBody<CreateNoteRequest>,
) -> Result<(StatusCode, Json<NoteResponse>), AppError> {
    let (Some(rating), Some(comment), Some(coffee_id)) = (
        req.rating,
        required_text(req.comment.as_deref()),
        req.coffee_id,
    ) else {
        return Err(AppError::Validation(
            "Rating, comment and coffee_id are required".to_string(),
        ));
    };

    if state.db.get_coffee(coffee_id).await?.is_none() {
        return Err(AppError::not_found("Coffee not found"));
    }

    let note = state
        .db
        .insert_note(rating, comment, user_id, coffee_id)
        .await?;
    tracing::info!(note_id = note.id, coffee_id, user_id, "Note created");

    Ok((StatusCode::CREATED, Json(note_to_response(&note))))
}

/// GET /notes/:id
pub async fn get_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<NoteResponse>, AppError> {
    let note = state
        .db
        .get_note_for_user(id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Note not found"))?;

    Ok(Json(note_to_response(&note)))
}

/// PATCH /notes/:id
pub async fn update_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<i64>,
    WithRejection(Json(req), _): JsonBody<UpdateNoteRequest>,
) -> Result<Json<NoteResponse>, AppError> {
    let mut note = state
        .db
        .get_note_for_user(id, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("Note not found"))?;

    if let Some(rating) = req.rating {
        note.rating = rating;
    }
    if let Some(comment) = req.comment {
        note.comment = comment;
    }
    state.db.update_note(&note).await?;

    Ok(Json(note_to_response(&note)))
}

/// DELETE /notes/:id
pub async fn delete_note(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state.db.delete_note_for_user(id, user_id).await? {
        return Err(AppError::not_found("Note not found"));
    }

    Ok(Json(MessageResponse::new("Note deleted successfully")))
}
