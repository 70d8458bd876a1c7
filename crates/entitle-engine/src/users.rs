//! User operations exposed to the HTTP layer.
//!
//! `UserService` owns no record state. Saves and feature checks go through
//! the gateway as atomic procedures; reading a user is two plain hash reads.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use entitle_core::{
    encode_attributes, features_key, format_timestamp, is_flag_feature, subscription_plan,
    user_key, EntitlementError, FeatureValue, FieldMap, Plan, Result, UserId, FEATURES_PREFIX,
    USER_PREFIX,
};
use entitle_store::{ScriptGateway, ScriptStore, ScriptTable};

use crate::scripts::{CHECK_FEATURE, FEATURE_UNDEFINED_CODE, SAVE_USER};

/// Result of a save: the feature record as it stands after the save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedUser {
    /// The saved user.
    pub user_id: String,
    /// Feature record after the save.
    pub features: FieldMap,
}

/// A user record together with its feature record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    /// The user.
    pub user_id: String,
    /// Stored user attributes.
    pub user: FieldMap,
    /// Feature record, empty if none was derived yet.
    pub features: FieldMap,
}

/// Result of a single feature check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureAccess {
    /// The user.
    pub user_id: String,
    /// The feature that was checked.
    pub feature: String,
    /// Boolean for `has_export_feature`, the stored text otherwise.
    pub value: FeatureValue,
}

/// Subscription and entitlement operations on top of a script gateway.
#[derive(Clone)]
pub struct UserService {
    gateway: ScriptGateway,
}

impl UserService {
    /// Create a service over an existing gateway.
    #[must_use]
    pub fn new(gateway: ScriptGateway) -> Self {
        Self { gateway }
    }

    /// Build the script table for the entitlement procedures, preload it
    /// into `store` and return the ready service.
    ///
    /// Preload failures are logged; affected procedures fall back to body
    /// submission.
    pub async fn connect(store: Arc<dyn ScriptStore>) -> Self {
        let table = Arc::new(ScriptTable::from_procedures(&crate::procedures()));
        let gateway = ScriptGateway::new(store, table);

        let loaded = gateway.preload().await;
        tracing::info!(loaded, "Entitlement scripts preloaded");

        Self::new(gateway)
    }

    /// The gateway procedures are invoked through.
    #[must_use]
    pub fn gateway(&self) -> &ScriptGateway {
        &self.gateway
    }

    /// Create or update a user and derive their features, stamped with the
    /// current time.
    ///
    /// # Errors
    ///
    /// See [`UserService::save_user_at`].
    pub async fn save_user(&self, user_id: &UserId, attributes: &FieldMap) -> Result<SavedUser> {
        let timestamp = format_timestamp(Utc::now());
        self.save_user_at(user_id, attributes, &timestamp).await
    }

    /// Create or update a user and derive their features, recording
    /// `timestamp` as `last_updated`.
    ///
    /// Attributes are merged into the existing user record. An unrecognized
    /// `subscription_plan` leaves the feature values untouched but still
    /// updates `last_updated`.
    ///
    /// # Errors
    ///
    /// - `EntitlementError::MissingPlan` if `subscription_plan` is absent.
    /// - `EntitlementError::Storage` if the store or procedure fails.
    pub async fn save_user_at(
        &self,
        user_id: &UserId,
        attributes: &FieldMap,
        timestamp: &str,
    ) -> Result<SavedUser> {
        let plan = subscription_plan(attributes).ok_or(EntitlementError::MissingPlan)?;
        if Plan::from_name(plan).is_none() {
            tracing::warn!(
                user_id = %user_id,
                plan = %plan,
                "Unrecognized subscription plan, feature values left unchanged"
            );
        }

        let keys = [USER_PREFIX.to_string(), FEATURES_PREFIX.to_string()];
        let args = [
            user_id.to_string(),
            encode_attributes(attributes)?,
            timestamp.to_string(),
        ];

        let features = self
            .gateway
            .invoke(SAVE_USER, &keys, &args)
            .await
            .and_then(entitle_store::Reply::into_fields)
            .map_err(|e| {
                tracing::error!(
                    user_id = %user_id,
                    error = %e,
                    "Error saving user and setting features"
                );
                EntitlementError::from(e)
            })?;

        if features.is_empty() {
            return Err(EntitlementError::Storage(
                "save procedure returned no features".into(),
            ));
        }

        tracing::info!(user_id = %user_id, plan = %plan, "User saved with plan features");

        Ok(SavedUser {
            user_id: user_id.to_string(),
            features,
        })
    }

    /// Fetch a user record and its feature record.
    ///
    /// # Errors
    ///
    /// - `EntitlementError::UserNotFound` if no user record exists.
    /// - `EntitlementError::Storage` if the store fails.
    pub async fn get_user(&self, user_id: &UserId) -> Result<UserProfile> {
        let store = self.gateway.store();

        let user = store.hgetall(&user_key(user_id)).await?;
        if user.is_empty() {
            return Err(EntitlementError::UserNotFound {
                user_id: user_id.to_string(),
            });
        }

        let features = store.hgetall(&features_key(user_id)).await?;

        Ok(UserProfile {
            user_id: user_id.to_string(),
            user,
            features,
        })
    }

    /// Check a single feature on the user's feature record.
    ///
    /// # Errors
    ///
    /// - `EntitlementError::FeatureNotDefined` if the record lacks the field,
    ///   including when the user has no feature record at all.
    /// - `EntitlementError::Storage` if the store fails.
    pub async fn check_feature_access(
        &self,
        user_id: &UserId,
        feature: &str,
    ) -> Result<FeatureAccess> {
        let keys = [FEATURES_PREFIX.to_string()];
        let args = [user_id.to_string(), feature.to_string()];

        let reply = match self.gateway.invoke(CHECK_FEATURE, &keys, &args).await {
            Ok(reply) => reply,
            Err(e) if e.script_code() == Some(FEATURE_UNDEFINED_CODE) => {
                return Err(EntitlementError::FeatureNotDefined {
                    feature: feature.to_string(),
                });
            }
            Err(e) => {
                tracing::error!(
                    user_id = %user_id,
                    feature = %feature,
                    error = %e,
                    "Error checking feature access"
                );
                return Err(EntitlementError::from(e));
            }
        };

        let value = if is_flag_feature(feature) {
            FeatureValue::Flag(reply.is_truthy())
        } else {
            FeatureValue::Text(reply.into_text()?)
        };

        Ok(FeatureAccess {
            user_id: user_id.to_string(),
            feature: feature.to_string(),
            value,
        })
    }
}
