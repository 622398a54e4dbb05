//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{OpenAiVisionAdapter, PgStore},
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        create_wine_handler, delete_wine_handler, get_wine_handler, list_wines_handler,
        rate_wine_handler, require_auth,
        rest::ApiDoc,
        scan_wine_handler, state::AppState, toggle_drunk_handler, update_wine_handler,
        view_collection_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use cellar_core::ports::ExtractionService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let store = Arc::new(PgStore::new(db_pool));
    info!("Running database migrations...");
    store.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Vision Adapter ---
    // The key is optional: without it the scan endpoint reports the vision
    // service as unconfigured instead of failing startup.
    let vision: Option<Arc<dyn ExtractionService>> = match config.openai_api_key.as_deref() {
        Some(key) => {
            let openai_config = OpenAIConfig::new().with_api_key(key);
            let client = Client::with_config(openai_config);
            Some(Arc::new(OpenAiVisionAdapter::new(
                client,
                config.vision_model.clone(),
            )))
        }
        None => {
            warn!("OPENAI_API_KEY is not set; wine scanning is disabled");
            None
        }
    };

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        records: store.clone(),
        identity: store,
        vision,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .cors_origin
                .parse::<HeaderValue>()
                .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?,
        )
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no session required; /scan is gated by the server key)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/scan", post(scan_wine_handler));

    // Protected routes (session required)
    let protected_routes = Router::new()
        .route("/wines", get(list_wines_handler).post(create_wine_handler))
        .route("/wines/view", get(view_collection_handler))
        .route(
            "/wines/{id}",
            get(get_wine_handler)
                .put(update_wine_handler)
                .delete(delete_wine_handler),
        )
        .route("/wines/{id}/toggle-drunk", post(toggle_drunk_handler))
        .route("/wines/{id}/rating", post(rate_wine_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
