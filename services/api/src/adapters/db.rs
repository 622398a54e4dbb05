//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RecordStore` and `IdentityStore` ports from the `core` crate. It handles
//! all interactions with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use cellar_core::domain::{NewWine, User, UserCredentials, WinePatch, WineRecord};
use cellar_core::ports::{IdentityStore, PortError, PortResult, RecordStore};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RecordStore` and `IdentityStore` ports.
///
/// Queries are runtime-checked so the crate builds without a live
/// `DATABASE_URL`; the schema lives in `migrations/` and is embedded via
/// `sqlx::migrate!`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn wine_not_found(id: i64) -> PortError {
    PortError::NotFound(format!("Wine {} not found", id))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct WineRow {
    id: i64,
    user_id: Uuid,
    name: String,
    wine_type: String,
    region: String,
    description: String,
    is_drunk: bool,
    rating: i32,
}

impl WineRow {
    fn to_domain(self) -> WineRecord {
        WineRecord {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            wine_type: self.wine_type,
            region: self.region,
            description: self.description,
            is_drunk: self.is_drunk,
            rating: self.rating,
        }
    }
}

#[derive(FromRow)]
struct UserRow {
    user_id: Uuid,
    email: String,
}

impl UserRow {
    fn to_domain(self) -> User {
        User {
            user_id: self.user_id,
            email: self.email,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRow {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

impl CredentialsRow {
    fn to_domain(self) -> UserCredentials {
        UserCredentials {
            user_id: self.user_id,
            email: self.email,
            hashed_password: self.hashed_password,
        }
    }
}

//=========================================================================================
// `RecordStore` Trait Implementation
//=========================================================================================

const WINE_COLUMNS: &str = "id, user_id, name, wine_type, region, description, is_drunk, rating";

#[async_trait]
impl RecordStore for PgStore {
    async fn list(&self, user_id: Uuid) -> PortResult<Vec<WineRecord>> {
        let rows = sqlx::query_as::<_, WineRow>(&format!(
            "SELECT {} FROM wines WHERE user_id = $1 ORDER BY id",
            WINE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(rows.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn create(&self, user_id: Uuid, fields: NewWine) -> PortResult<WineRecord> {
        fields.validate()?;

        let row = sqlx::query_as::<_, WineRow>(&format!(
            "INSERT INTO wines (user_id, name, wine_type, region, description) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            WINE_COLUMNS
        ))
        .bind(user_id)
        .bind(&fields.name)
        .bind(&fields.wine_type)
        .bind(&fields.region)
        .bind(&fields.description)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(row.to_domain())
    }

    async fn get(&self, id: i64, user_id: Uuid) -> PortResult<WineRecord> {
        let row = sqlx::query_as::<_, WineRow>(&format!(
            "SELECT {} FROM wines WHERE id = $1 AND user_id = $2",
            WINE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|r| r.to_domain()).ok_or_else(|| wine_not_found(id))
    }

    async fn update(&self, id: i64, user_id: Uuid, patch: WinePatch) -> PortResult<WineRecord> {
        let row = sqlx::query_as::<_, WineRow>(&format!(
            "UPDATE wines SET \
                name = COALESCE($3, name), \
                wine_type = COALESCE($4, wine_type), \
                region = COALESCE($5, region), \
                description = COALESCE($6, description), \
                is_drunk = COALESCE($7, is_drunk), \
                rating = COALESCE($8, rating) \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            WINE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(patch.name)
        .bind(patch.wine_type)
        .bind(patch.region)
        .bind(patch.description)
        .bind(patch.is_drunk)
        .bind(patch.rating)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|r| r.to_domain()).ok_or_else(|| wine_not_found(id))
    }

    async fn delete(&self, id: i64, user_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM wines WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        if result.rows_affected() == 0 {
            return Err(wine_not_found(id));
        }
        Ok(())
    }

    async fn set_rating(&self, id: i64, user_id: Uuid, rating: i32) -> PortResult<WineRecord> {
        if !(0..=5).contains(&rating) {
            return Err(PortError::Validation(format!(
                "rating must be between 0 and 5, got {}",
                rating
            )));
        }

        let row = sqlx::query_as::<_, WineRow>(&format!(
            "UPDATE wines SET rating = $3 WHERE id = $1 AND user_id = $2 RETURNING {}",
            WINE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(rating)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|r| r.to_domain()).ok_or_else(|| wine_not_found(id))
    }

    async fn set_drunk(&self, id: i64, user_id: Uuid, is_drunk: bool) -> PortResult<WineRecord> {
        // Marking a wine undrunk resets its rating in the same statement,
        // so the coupling invariant holds even if the request dies here.
        let row = sqlx::query_as::<_, WineRow>(&format!(
            "UPDATE wines SET is_drunk = $3, rating = CASE WHEN $3 THEN rating ELSE 0 END \
             WHERE id = $1 AND user_id = $2 RETURNING {}",
            WINE_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .bind(is_drunk)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|r| r.to_domain()).ok_or_else(|| wine_not_found(id))
    }
}

//=========================================================================================
// `IdentityStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl IdentityStore for PgStore {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "INSERT INTO users (email, hashed_password) VALUES ($1, $2) RETURNING user_id, email",
        )
        .bind(email)
        .bind(hashed_password)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(row.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        row.map(|r| r.to_domain())
            .ok_or_else(|| PortError::NotFound(format!("No account for {}", email)))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM auth_sessions WHERE id = $1 AND expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;

        user_id.ok_or(PortError::Unauthorized)
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }
}
