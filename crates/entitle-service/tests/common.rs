//! Common test utilities for entitle integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::TestServer;
use serde_json::{json, Value};

use entitle_service::{create_router, AppState, ServiceConfig, StoreBackend};
use entitle_store::MemoryStore;

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for inspecting script traffic.
    pub store: Arc<MemoryStore>,
}

impl TestHarness {
    /// Create a new test harness over a fresh in-memory store.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new(&entitle_engine::procedures()));

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            store_backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".into(),
            data_dir: String::new(),
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        };

        let state = AppState::connect(store.clone(), config).await;
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self { server, store }
    }

    /// Save a user and return the response body.
    pub async fn save_user(&self, user_id: &str, body: Value) -> Value {
        let response = self
            .server
            .post(&format!("/api/v1/users/{user_id}"))
            .json(&body)
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json()
    }

    /// Save a user on the given plan with a name attribute.
    pub async fn save_on_plan(&self, user_id: &str, plan: &str) -> Value {
        self.save_user(
            user_id,
            json!({ "name": "Test User", "subscription_plan": plan }),
        )
        .await
    }
}
