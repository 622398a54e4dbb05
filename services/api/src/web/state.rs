//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use cellar_core::ports::{ExtractionService, IdentityStore, RecordStore};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn RecordStore>,
    pub identity: Arc<dyn IdentityStore>,
    /// `None` when no server-side vision key is configured; the scan
    /// endpoint then reports the service as unavailable.
    pub vision: Option<Arc<dyn ExtractionService>>,
    pub config: Arc<Config>,
}
