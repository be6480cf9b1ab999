//! Conversion functions from database models to API DTOs

use crate::api::dto::*;
use crate::data::{Cafe, Coffee, Database, Note, User};
use crate::error::AppError;

pub fn cafe_to_summary(cafe: &Cafe) -> CafeSummary {
    CafeSummary {
        id: cafe.id,
        name: cafe.name.clone(),
        location: cafe.location.clone(),
    }
}

pub fn coffee_to_summary(coffee: &Coffee) -> CoffeeSummary {
    CoffeeSummary {
        id: coffee.id,
        name: coffee.name.clone(),
        description: coffee.description.clone(),
        cafe_id: coffee.cafe_id,
    }
}

pub fn note_to_response(note: &Note) -> NoteResponse {
    NoteResponse {
        id: note.id,
        rating: note.rating,
        comment: note.comment.clone(),
        user_id: note.user_id,
        coffee_id: note.coffee_id,
    }
}

/// Convert User to UserResponse, loading the user's notes and noted coffees
pub async fn user_to_response(db: &Database, user: &User) -> Result<UserResponse, AppError> {
    let notes = db.list_notes_by_user(user.id).await?;
    let coffees = db.list_coffees_noted_by_user(user.id).await?;

    Ok(UserResponse {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        avatar_url: user.avatar_url.clone(),
        is_oauth_user: user.is_oauth_user,
        created_at: user.created_at.to_rfc3339(),
        updated_at: user.updated_at.to_rfc3339(),
        notes: notes.iter().map(note_to_response).collect(),
        coffees: coffees.iter().map(coffee_to_summary).collect(),
    })
}

pub async fn cafe_to_response(db: &Database, cafe: &Cafe) -> Result<CafeResponse, AppError> {
    let coffees = db.list_coffees_by_cafe(cafe.id).await?;

    Ok(CafeResponse {
        cafe: cafe_to_summary(cafe),
        coffees: coffees.iter().map(coffee_to_summary).collect(),
    })
}

pub async fn coffee_to_response(db: &Database, coffee: &Coffee) -> Result<CoffeeResponse, AppError> {
    let cafe = db.get_cafe(coffee.cafe_id).await?;

    Ok(CoffeeResponse {
        coffee: coffee_to_summary(coffee),
        cafe: cafe.as_ref().map(cafe_to_summary),
    })
}
