pub mod auth;
pub mod middleware;
pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that will build the web server router.
pub use middleware::require_auth;
pub use rest::{
    create_wine_handler, delete_wine_handler, get_wine_handler, list_wines_handler,
    rate_wine_handler, scan_wine_handler, toggle_drunk_handler, update_wine_handler,
    view_collection_handler,
};
