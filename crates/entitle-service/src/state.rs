//! Application state.

use std::sync::Arc;

use entitle_engine::UserService;
use entitle_store::ScriptStore;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// User and entitlement operations.
    pub users: UserService,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create application state over an open store connection.
    ///
    /// Loads the entitlement scripts into the store first; load failures are
    /// logged and do not stop startup.
    pub async fn connect(store: Arc<dyn ScriptStore>, config: ServiceConfig) -> Self {
        let users = UserService::connect(store).await;

        let table = users.gateway().table();
        if table.names().any(|name| table.handle(name).is_none()) {
            tracing::warn!("Some scripts are not cached - bodies will be submitted in full");
        }

        Self { users, config }
    }
}
