//! crates/cellar_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs double as the wire format (camelCase JSON), but carry
//! no database or HTTP types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// The fixed allow-list a scanned wine type is normalized against.
pub const VALID_WINE_TYPES: [&str; 6] = ["Red", "Sparkling", "White", "Rose", "Dessert", "Fortified"];

/// Maps a free-form type string onto the allow-list by case-insensitive
/// substring match. Anything unmatched becomes `"Other"`.
pub fn normalize_wine_type(raw: &str) -> String {
    let normalized = raw.trim().to_lowercase();
    VALID_WINE_TYPES
        .iter()
        .find(|valid| normalized.contains(&valid.to_lowercase()))
        .map(|valid| valid.to_string())
        .unwrap_or_else(|| "Other".to_string())
}

/// A single tracked wine entry, as persisted by the record store.
///
/// Invariant: `rating` is 0 whenever `is_drunk` is false. The store
/// enforces this on the drunk transition; the view model enforces it on
/// the rating path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WineRecord {
    pub id: i64,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    pub region: String,
    pub description: String,
    pub is_drunk: bool,
    pub rating: i32,
}

/// The payload for creating a wine. All four fields are required and
/// must be non-empty.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewWine {
    pub name: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    pub region: String,
    pub description: String,
}

impl NewWine {
    /// Rejects the first absent-or-empty required field, mirroring the
    /// create endpoint's validation contract.
    pub fn validate(&self) -> PortResult<()> {
        let fields = [
            ("name", &self.name),
            ("type", &self.wine_type),
            ("region", &self.region),
            ("description", &self.description),
        ];
        for (label, value) in fields {
            if value.trim().is_empty() {
                return Err(PortError::Validation(format!(
                    "Missing required field: {}",
                    label
                )));
            }
        }
        Ok(())
    }
}

/// A partial update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WinePatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub wine_type: Option<String>,
    pub region: Option<String>,
    pub description: Option<String>,
    pub is_drunk: Option<bool>,
    pub rating: Option<i32>,
}

/// An unpersisted candidate record produced by the extraction adapter,
/// awaiting user confirmation. Every field has an explicit fallback, so
/// a draft is always complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub wine_type: String,
    pub region: String,
    pub description: String,
}

impl DraftRecord {
    /// Converts a confirmed draft into a create payload.
    pub fn into_new_wine(self) -> NewWine {
        NewWine {
            name: self.name,
            wine_type: self.wine_type,
            region: self.region,
            description: self.description,
        }
    }
}

// Represents a user - used throughout the app
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
