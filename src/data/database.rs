//! SQLite database operations
//!
//! All database access goes through this module.

use chrono::Utc;
use sqlx::{Pool, Sqlite, SqlitePool};
use std::path::Path;

use super::models::*;
use crate::error::AppError;

/// Database connection pool wrapper.
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Connect to SQLite database
    ///
    /// Creates the database file if it doesn't exist.
    /// Runs pending migrations automatically.
    ///
    /// # Errors
    /// Returns error if connection or migration fails
    pub async fn connect(path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AppError::Database(sqlx::Error::Io(e)))?;
        }

        let connection_string = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&connection_string).await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Migration failed: {}", e);
                AppError::Internal(anyhow::anyhow!("Migration failed: {}", e))
            })?;

        tracing::info!(path = %path.display(), "Database connected and migrated successfully");

        Ok(Self { pool })
    }

    /// Close the pool, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Users
    // =========================================================================

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Find the user a GitHub account is attached to
    pub async fn get_user_by_github_id(&self, github_id: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE github_id = ?")
            .bind(github_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn count_users(&self) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Insert a user
    ///
    /// # Errors
    /// Returns `AppError::Database` carrying a unique violation when the
    /// username, email or GitHub id is already taken.
    pub async fn insert_user(&self, user: &NewUser) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let created = insert_user_in(&mut tx, user).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Insert a user and bind a session to it in one transaction
    ///
    /// Either both rows are written (and `replaced` deleted) or nothing
    /// changes. The `user_id` of `session` is ignored and replaced by the new
    /// user's id.
    pub async fn insert_user_with_session(
        &self,
        user: &NewUser,
        session: &SessionRecord,
        replaced: Option<&str>,
    ) -> Result<User, AppError> {
        let mut tx = self.pool.begin().await?;
        let created = insert_user_in(&mut tx, user).await?;
        delete_session_in(&mut tx, replaced).await?;

        sqlx::query(UPSERT_SESSION_SQL)
            .bind(&session.token_hash)
            .bind(created.id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(created)
    }

    /// Attach a GitHub identity to an existing user
    ///
    /// Returns false when the user does not exist. `is_oauth_user` is not
    /// touched.
    pub async fn link_github(
        &self,
        user_id: i64,
        github_id: &str,
        avatar_url: Option<&str>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET github_id = ?, avatar_url = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(github_id)
        .bind(avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    pub async fn get_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, AppError> {
        let session =
            sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;

        Ok(session)
    }

    /// Create the session row or point an existing one at `session.user_id`
    pub async fn upsert_session(&self, session: &SessionRecord) -> Result<(), AppError> {
        sqlx::query(UPSERT_SESSION_SQL)
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Store `session` and drop the row for the token it supersedes
    pub async fn replace_session(
        &self,
        session: &SessionRecord,
        replaced: Option<&str>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        delete_session_in(&mut tx, replaced).await?;

        sqlx::query(UPSERT_SESSION_SQL)
            .bind(&session.token_hash)
            .bind(session.user_id)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Detach the user from a session, keeping the row
    pub async fn clear_session_user(&self, token_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET user_id = NULL WHERE token_hash = ? AND user_id IS NOT NULL",
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete sessions that expired at or before `now` (unix seconds)
    pub async fn delete_expired_sessions(&self, now: i64) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Cafes
    // =========================================================================

    pub async fn list_cafes(&self) -> Result<Vec<Cafe>, AppError> {
        let cafes = sqlx::query_as::<_, Cafe>("SELECT * FROM cafes ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(cafes)
    }

    pub async fn get_cafe(&self, id: i64) -> Result<Option<Cafe>, AppError> {
        let cafe = sqlx::query_as::<_, Cafe>("SELECT * FROM cafes WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(cafe)
    }

    pub async fn insert_cafe(&self, name: &str, location: &str) -> Result<Cafe, AppError> {
        let cafe = sqlx::query_as::<_, Cafe>(
            "INSERT INTO cafes (name, location) VALUES (?, ?) RETURNING *",
        )
        .bind(name)
        .bind(location)
        .fetch_one(&self.pool)
        .await?;

        Ok(cafe)
    }

    pub async fn update_cafe(&self, cafe: &Cafe) -> Result<(), AppError> {
        sqlx::query("UPDATE cafes SET name = ?, location = ? WHERE id = ?")
            .bind(&cafe.name)
            .bind(&cafe.location)
            .bind(cafe.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Delete a cafe; its coffees and their notes cascade
    pub async fn delete_cafe(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM cafes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Coffees
    // =========================================================================

    pub async fn list_coffees(&self) -> Result<Vec<Coffee>, AppError> {
        let coffees = sqlx::query_as::<_, Coffee>("SELECT * FROM coffees ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(coffees)
    }

    pub async fn list_coffees_by_cafe(&self, cafe_id: i64) -> Result<Vec<Coffee>, AppError> {
        let coffees =
            sqlx::query_as::<_, Coffee>("SELECT * FROM coffees WHERE cafe_id = ? ORDER BY id")
                .bind(cafe_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(coffees)
    }

    /// Distinct coffees a user has written notes about
    pub async fn list_coffees_noted_by_user(&self, user_id: i64) -> Result<Vec<Coffee>, AppError> {
        let coffees = sqlx::query_as::<_, Coffee>(
            r#"
            SELECT DISTINCT coffees.*
            FROM coffees
            JOIN notes ON notes.coffee_id = coffees.id
            WHERE notes.user_id = ?
            ORDER BY coffees.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(coffees)
    }

    pub async fn get_coffee(&self, id: i64) -> Result<Option<Coffee>, AppError> {
        let coffee = sqlx::query_as::<_, Coffee>("SELECT * FROM coffees WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(coffee)
    }

    pub async fn insert_coffee(
        &self,
        name: &str,
        description: &str,
        cafe_id: i64,
    ) -> Result<Coffee, AppError> {
        let coffee = sqlx::query_as::<_, Coffee>(
            "INSERT INTO coffees (name, description, cafe_id) VALUES (?, ?, ?) RETURNING *",
        )
        .bind(name)
        .bind(description)
        .bind(cafe_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(coffee)
    }

    pub async fn update_coffee(&self, coffee: &Coffee) -> Result<(), AppError> {
        sqlx::query("UPDATE coffees SET name = ?, description = ? WHERE id = ?")
            .bind(&coffee.name)
            .bind(&coffee.description)
            .bind(coffee.id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_coffee(&self, id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM coffees WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Notes (always scoped to their author)
    // =========================================================================

    pub async fn list_notes_by_user(&self, user_id: i64) -> Result<Vec<Note>, AppError> {
        let notes = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE user_id = ? ORDER BY id")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(notes)
    }

    pub async fn get_note_for_user(&self, id: i64, user_id: i64) -> Result<Option<Note>, AppError> {
        let note = sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(note)
    }

    pub async fn insert_note(
        &self,
        rating: i64,
        comment: &str,
        user_id: i64,
        coffee_id: i64,
    ) -> Result<Note, AppError> {
        let note = sqlx::query_as::<_, Note>(
            r#"
            INSERT INTO notes (rating, comment, user_id, coffee_id)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(rating)
        .bind(comment)
        .bind(user_id)
        .bind(coffee_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(note)
    }

    pub async fn update_note(&self, note: &Note) -> Result<(), AppError> {
        sqlx::query("UPDATE notes SET rating = ?, comment = ? WHERE id = ? AND user_id = ?")
            .bind(note.rating)
            .bind(&note.comment)
            .bind(note.id)
            .bind(note.user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn delete_note_for_user(&self, id: i64, user_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

const UPSERT_SESSION_SQL: &str = r#"
    INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT(token_hash) DO UPDATE SET
        user_id = excluded.user_id,
        expires_at = excluded.expires_at
"#;

async fn delete_session_in(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    token_hash: Option<&str>,
) -> Result<(), AppError> {
    if let Some(token_hash) = token_hash {
        sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn insert_user_in(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    user: &NewUser,
) -> Result<User, AppError> {
    let now = Utc::now();
    let created = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (
            username, email, password_hash, github_id, avatar_url,
            is_oauth_user, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(&user.github_id)
    .bind(&user.avatar_url)
    .bind(user.is_oauth_user)
    .bind(now)
    .bind(now)
    .fetch_one(&mut **tx)
    .await?;

    Ok(created)
}
