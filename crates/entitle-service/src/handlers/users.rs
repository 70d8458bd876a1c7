//! User and feature handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use entitle_core::{attributes_from_json, EntitlementError, FieldMap, UserId};
use entitle_engine::{FeatureAccess, UserProfile};

use crate::error::ApiError;
use crate::state::AppState;

/// Response to a create/update.
#[derive(Debug, Serialize)]
pub struct SaveUserResponse {
    /// Human readable outcome.
    pub message: String,
    /// The saved user.
    pub user_id: String,
    /// Feature record after the save.
    pub features: FieldMap,
}

/// Create or update a user; features are derived from `subscription_plan`.
pub async fn save_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<SaveUserResponse>), ApiError> {
    let user_id = UserId::new(id).map_err(EntitlementError::from)?;

    let Json(body) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Value::Object(object) = body else {
        return Err(ApiError::BadRequest(
            "request body must be a JSON object".into(),
        ));
    };
    let attributes = attributes_from_json(object)?;

    tracing::debug!(user_id = %user_id, fields = attributes.len(), "Saving user");

    let saved = state.users.save_user(&user_id, &attributes).await?;

    Ok((
        StatusCode::CREATED,
        Json(SaveUserResponse {
            message: "User created/updated with plan features".into(),
            user_id: saved.user_id,
            features: saved.features,
        }),
    ))
}

/// Get a user with their features.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<UserProfile>, ApiError> {
    let user_id = UserId::new(id).map_err(EntitlementError::from)?;
    let profile = state.users.get_user(&user_id).await?;
    Ok(Json(profile))
}

/// Check a single feature for a user.
pub async fn check_feature(
    State(state): State<Arc<AppState>>,
    Path((id, feature)): Path<(String, String)>,
) -> Result<Json<FeatureAccess>, ApiError> {
    let user_id = UserId::new(id).map_err(EntitlementError::from)?;
    let access = state.users.check_feature_access(&user_id, &feature).await?;
    Ok(Json(access))
}
