//! Shared application state.

use std::sync::Arc;

use pot_chain::NodeHandle;

/// State held by the API handlers.
///
/// This is wrapped in an [`Arc`] and passed to request handlers via
/// Axum's `State` extractor. The [`NodeHandle`] is the only channel into
/// the node's event loop, so handlers never touch consensus state
/// directly.
pub struct AppState {
    /// Handle of the embedded Proof-of-Turn node.
    pub node: NodeHandle,
}

/// Thread-safe alias for `AppState`.
pub type SharedState = Arc<AppState>;
