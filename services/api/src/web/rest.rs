//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the wine-collection REST endpoints and the
//! master definition for the OpenAPI specification.
//!
//! Every protected handler reads the caller's identity from the request
//! extensions populated by `require_auth` and scopes all store calls by it.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use cellar_core::collection::{derive_view, CollectionView, GroupKey, SortKey};
use cellar_core::domain::{DraftRecord, NewWine, WinePatch, WineRecord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::auth::{AuthResponse, LoginRequest, SignupRequest};
use crate::web::state::AppState;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_wines_handler,
        create_wine_handler,
        get_wine_handler,
        update_wine_handler,
        delete_wine_handler,
        toggle_drunk_handler,
        rate_wine_handler,
        scan_wine_handler,
        view_collection_handler,
        crate::web::auth::signup_handler,
        crate::web::auth::login_handler,
        crate::web::auth::logout_handler,
    ),
    components(
        schemas(RateRequest, ScanRequest, DeleteResponse, SignupRequest, LoginRequest, AuthResponse)
    ),
    tags(
        (name = "Wine Cellar API", description = "API endpoints for the personal wine-cellar tracker.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Request/Response Payload Structs
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RateRequest {
    pub rating: i32,
}

#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub image_url: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeleteResponse {
    pub message: String,
}

/// Query parameters for the server-rendered collection view.
#[derive(Deserialize)]
pub struct ViewParams {
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub sort_by: SortKey,
    #[serde(default)]
    pub group_by: GroupKey,
}

//=========================================================================================
// Wine CRUD Handlers
//=========================================================================================

/// List all wines owned by the caller.
#[utoipa::path(
    get,
    path = "/wines",
    responses(
        (status = 200, description = "The caller's wine records"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_wines_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<WineRecord>>, ApiError> {
    debug!("Fetching wines for user {}", user_id);
    let wines = state.records.list(user_id).await?;
    Ok(Json(wines))
}

/// Create a wine. All four fields (name, type, region, description) are
/// required and must be non-empty.
#[utoipa::path(
    post,
    path = "/wines",
    responses(
        (status = 201, description = "Wine created"),
        (status = 400, description = "Missing required field"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn create_wine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(fields): Json<NewWine>,
) -> Result<impl IntoResponse, ApiError> {
    let wine = state.records.create(user_id, fields).await?;
    info!("Created wine {} for user {}", wine.id, user_id);
    Ok((StatusCode::CREATED, Json(wine)))
}

/// Fetch a single wine by id.
#[utoipa::path(
    get,
    path = "/wines/{id}",
    responses(
        (status = 200, description = "The wine record"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Wine not found (or not owned by the caller)"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i64, Path, description = "The wine's store-assigned id"))
)]
pub async fn get_wine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
) -> Result<Json<WineRecord>, ApiError> {
    let wine = state.records.get(id, user_id).await?;
    Ok(Json(wine))
}

/// Apply a partial update to a wine. Absent fields are left untouched.
#[utoipa::path(
    put,
    path = "/wines/{id}",
    responses(
        (status = 200, description = "The updated wine record"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Wine not found (or not owned by the caller)"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i64, Path, description = "The wine's store-assigned id"))
)]
pub async fn update_wine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
    Json(patch): Json<WinePatch>,
) -> Result<Json<WineRecord>, ApiError> {
    let wine = state.records.update(id, user_id, patch).await?;
    Ok(Json(wine))
}

/// Delete a wine.
#[utoipa::path(
    delete,
    path = "/wines/{id}",
    responses(
        (status = 200, description = "Wine deleted", body = DeleteResponse),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Wine not found (or not owned by the caller)"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i64, Path, description = "The wine's store-assigned id"))
)]
pub async fn delete_wine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteResponse>, ApiError> {
    state.records.delete(id, user_id).await?;
    info!("Deleted wine {} for user {}", id, user_id);
    Ok(Json(DeleteResponse {
        message: "Wine deleted successfully".to_string(),
    }))
}

//=========================================================================================
// Drink / Rating Handlers
//=========================================================================================

/// Flip the wine's drunk flag. Marking a wine undrunk resets its rating to
/// 0 atomically.
#[utoipa::path(
    post,
    path = "/wines/{id}/toggle-drunk",
    responses(
        (status = 200, description = "The updated wine record, rating reset if now undrunk"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Wine not found (or not owned by the caller)"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i64, Path, description = "The wine's store-assigned id"))
)]
pub async fn toggle_drunk_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
) -> Result<Json<WineRecord>, ApiError> {
    let wine = state.records.get(id, user_id).await?;
    let updated = state.records.set_drunk(id, user_id, !wine.is_drunk).await?;
    Ok(Json(updated))
}

/// Set the wine's rating (0-5). The store stays lenient about rating an
/// undrunk wine; the client-side view model is the gate for that
/// transition.
#[utoipa::path(
    post,
    path = "/wines/{id}/rating",
    request_body = RateRequest,
    responses(
        (status = 200, description = "The updated wine record"),
        (status = 400, description = "Rating out of range"),
        (status = 401, description = "No valid session"),
        (status = 404, description = "Wine not found (or not owned by the caller)"),
        (status = 500, description = "Internal server error")
    ),
    params(("id" = i64, Path, description = "The wine's store-assigned id"))
)]
pub async fn rate_wine_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(id): Path<i64>,
    Json(req): Json<RateRequest>,
) -> Result<Json<WineRecord>, ApiError> {
    let updated = state.records.set_rating(id, user_id, req.rating).await?;
    Ok(Json(updated))
}

//=========================================================================================
// Collection View Handler
//=========================================================================================

/// Render the derived collection view: sorted, grouped, and filtered
/// server-side. `total` in the response is the pre-filter record count, so
/// an empty cellar is distinguishable from a search with no matches.
#[utoipa::path(
    get,
    path = "/wines/view",
    responses(
        (status = 200, description = "The grouped, sorted, filtered collection view"),
        (status = 401, description = "No valid session"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("search" = Option<String>, Query, description = "Case-insensitive substring matched against name, type, or region"),
        ("sort_by" = Option<String>, Query, description = "One of: name, type, region, rating"),
        ("group_by" = Option<String>, Query, description = "One of: none, type, region")
    )
)]
pub async fn view_collection_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Query(params): Query<ViewParams>,
) -> Result<Json<CollectionView>, ApiError> {
    let records = state.records.list(user_id).await?;
    let view = derive_view(&records, &params.search, params.sort_by, params.group_by);
    Ok(Json(view))
}

//=========================================================================================
// Scan Handler
//=========================================================================================

/// Extract a draft record from a bottle photo. Requires the server-side
/// vision key; the caller gets a retryable failure if the scan does not
/// come back.
#[utoipa::path(
    post,
    path = "/scan",
    request_body = ScanRequest,
    responses(
        (status = 200, description = "A draft record extracted from the image"),
        (status = 500, description = "Vision key missing or extraction failed")
    )
)]
pub async fn scan_wine_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<DraftRecord>, ApiError> {
    let vision = state
        .vision
        .as_ref()
        .ok_or_else(|| ApiError::Internal("OpenAI API key is not configured".to_string()))?;

    info!("Scanning wine image");
    let draft = vision.extract(&req.image_url).await?;
    Ok(Json(draft))
}
