//! crates/cellar_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{DraftRecord, NewWine, User, UserCredentials, WinePatch, WineRecord};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The record is absent, or owned by another identity. Terminal.
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A required field is absent or empty. Surfaced verbatim to the caller.
    #[error("Validation error: {0}")]
    Validation(String),
    /// No caller identity is present.
    #[error("Unauthorized")]
    Unauthorized,
    /// The vision service failed at the transport or auth level. Retryable
    /// by the caller; never raised for parse ambiguity.
    #[error("Wine scan failed: {0}")]
    Extraction(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The durable wine-record store. Every operation is scoped by the caller's
/// identity: an `(id, user_id)` pair that matches no owned record yields
/// `NotFound`, never another user's record.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn list(&self, user_id: Uuid) -> PortResult<Vec<WineRecord>>;

    /// Persists a new record. Fails with `Validation` if any required
    /// field is absent or empty.
    async fn create(&self, user_id: Uuid, fields: NewWine) -> PortResult<WineRecord>;

    async fn get(&self, id: i64, user_id: Uuid) -> PortResult<WineRecord>;

    async fn update(&self, id: i64, user_id: Uuid, patch: WinePatch) -> PortResult<WineRecord>;

    async fn delete(&self, id: i64, user_id: Uuid) -> PortResult<()>;

    async fn set_rating(&self, id: i64, user_id: Uuid, rating: i32) -> PortResult<WineRecord>;

    /// Sets the drunk flag. Setting `is_drunk = false` atomically forces
    /// `rating = 0` in the same operation.
    async fn set_drunk(&self, id: i64, user_id: Uuid, is_drunk: bool) -> PortResult<WineRecord>;
}

/// The authentication provider: user accounts and server-side browser
/// sessions. Supplies the trusted caller identity for everything else.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn create_user(&self, email: &str, hashed_password: &str) -> PortResult<User>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session id to its user, failing `Unauthorized` when the
    /// session is unknown or expired.
    async fn validate_auth_session(&self, session_id: &str) -> PortResult<Uuid>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}

/// The boundary to the external vision model: turns an image URL into a
/// draft record. Fails only on transport/auth errors, never on parse
/// ambiguity (missing fields degrade to defaults).
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(&self, image_url: &str) -> PortResult<DraftRecord>;
}
