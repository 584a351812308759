//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::store::DynStore;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Guestbook table, built once at startup
    pub store: DynStore,
}

impl AppState {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
