//! Entitlement procedures on the RocksDB store.

#![cfg(feature = "rocksdb-backend")]

use std::sync::Arc;

use tempfile::TempDir;

use entitle_core::{FeatureValue, FieldMap, UserId, PREMIUM_PLAN_FEATURES};
use entitle_engine::UserService;
use entitle_store::RocksStore;

const T1: &str = "2024-01-01T00:00:00.000Z";

fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

fn attrs(plan: &str) -> FieldMap {
    [("name", "Rocks User"), ("subscription_plan", plan)]
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

#[tokio::test]
async fn save_and_check_on_rocksdb() {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let store = RocksStore::open(dir.path(), &entitle_engine::procedures()).unwrap();
    let users = UserService::connect(Arc::new(store)).await;

    let saved = users
        .save_user_at(&uid("rocky"), &attrs("premium"), T1)
        .await
        .unwrap();
    assert_eq!(saved.features["projects_limit"], PREMIUM_PLAN_FEATURES.projects_limit);
    assert_eq!(saved.features["last_updated"], T1);

    let export = users
        .check_feature_access(&uid("rocky"), "has_export_feature")
        .await
        .unwrap();
    assert_eq!(export.value, FeatureValue::Flag(true));

    let err = users
        .check_feature_access(&uid("rocky"), "sso")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Feature not defined");
}

#[tokio::test]
async fn records_survive_reopen() {
    let dir = TempDir::new().expect("Failed to create temp directory");

    {
        let store = RocksStore::open(dir.path(), &entitle_engine::procedures()).unwrap();
        let users = UserService::connect(Arc::new(store)).await;
        users
            .save_user_at(&uid("persist"), &attrs("free"), T1)
            .await
            .unwrap();
    }

    let store = RocksStore::open(dir.path(), &entitle_engine::procedures()).unwrap();
    let users = UserService::connect(Arc::new(store)).await;

    let profile = users.get_user(&uid("persist")).await.unwrap();
    assert_eq!(profile.user["subscription_plan"], "free");
    assert_eq!(profile.features["team_members"], "1");

    let limit = users
        .check_feature_access(&uid("persist"), "projects_limit")
        .await
        .unwrap();
    assert_eq!(limit.value, FeatureValue::Text("3".into()));
}
