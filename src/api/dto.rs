//! API response and request DTOs
//!
//! Response shapes never carry the password hash or the GitHub id.

use serde::{Deserialize, Serialize};

/// User record returned by signup, login and check_session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub is_oauth_user: bool,
    pub created_at: String,
    pub updated_at: String,
    /// The user's notes
    pub notes: Vec<NoteResponse>,
    /// Distinct coffees the user has noted
    pub coffees: Vec<CoffeeSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CafeSummary {
    pub id: i64,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoffeeSummary {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub cafe_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CafeResponse {
    #[serde(flatten)]
    pub cafe: CafeSummary,
    pub coffees: Vec<CoffeeSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoffeeResponse {
    #[serde(flatten)]
    pub coffee: CoffeeSummary,
    pub cafe: Option<CafeSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteResponse {
    pub id: i64,
    pub rating: i64,
    pub comment: String,
    pub user_id: i64,
    pub coffee_id: i64,
}

/// Plain `{ "message": ... }` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// POST /cafes
#[derive(Debug, Deserialize)]
pub struct CreateCafeRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// PATCH /cafes/:id
#[derive(Debug, Deserialize)]
pub struct UpdateCafeRequest {
    pub name: Option<String>,
    pub location: Option<String>,
}

/// POST /coffees
#[derive(Debug, Deserialize)]
pub struct CreateCoffeeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub cafe_id: Option<i64>,
}

/// PATCH /coffees/:id
#[derive(Debug, Deserialize)]
pub struct UpdateCoffeeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// POST /notes
#[derive(Debug, Deserialize)]
pub struct CreateNoteRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
    pub coffee_id: Option<i64>,
}

/// PATCH /notes/:id
#[derive(Debug, Deserialize)]
pub struct UpdateNoteRequest {
    pub rating: Option<i64>,
    pub comment: Option<String>,
}
