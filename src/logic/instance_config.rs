use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigDefaults, INSTANCE_CONFIG_KEYS};
use crate::model::{
    push_field_error, ConfigurationEntry, FieldErrors, Instance, InstancePatch, InstanceState,
    UserContext,
};
use crate::store::traits::{ConfigurationStore, InstanceStore, WorkspaceStore};
use crate::store::{get_or_compute, CacheKey, Computed, ResponseCache, StoreError};

/// Path under which the instance-config response is cached
pub const INSTANCE_CONFIG_PATH: &str = "/instance-config";

#[derive(Debug, Error)]
pub enum InstanceConfigError {
    #[error("Instance is not configured")]
    NotConfigured,
    #[error("invalid instance fields")]
    FieldErrors(FieldErrors),
    #[error("You don't have the required permissions.")]
    PermissionDenied,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Integration and feature flags exposed to the web clients
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureConfig {
    pub is_google_enabled: bool,
    pub is_github_enabled: bool,
    pub is_magic_login_enabled: bool,
    pub is_email_password_enabled: bool,
    pub github_app_name: String,
    pub slack_client_id: Option<String>,
    pub posthog_api_key: Option<String>,
    pub posthog_host: Option<String>,
    pub has_unsplash_configured: bool,
    pub has_openai_configured: bool,
    pub file_size_limit: f64,
    pub is_smtp_configured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceView {
    #[serde(flatten)]
    pub instance: Instance,
    pub workspaces_exist: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InstanceConfigResponse {
    NotActivated { is_activated: bool, is_setup_done: bool },
    Activated { config: FeatureConfig, instance: InstanceView },
}

impl InstanceConfigResponse {
    pub fn not_activated() -> Self {
        InstanceConfigResponse::NotActivated {
            is_activated: false,
            is_setup_done: false,
        }
    }
}

fn to_json<T: Serialize>(value: T) -> Result<Value, InstanceConfigError> {
    serde_json::to_value(value).map_err(|e| InstanceConfigError::Store(StoreError::Unexpected(e.into())))
}

/// Resolved configuration values: override row first, then the environment default
struct ResolvedValues {
    values: HashMap<String, Option<String>>,
}

impl ResolvedValues {
    fn raw(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned().flatten()
    }

    fn flag(&self, key: &str) -> bool {
        self.raw(key).as_deref() == Some("1")
    }

    fn is_set(&self, key: &str) -> bool {
        self.raw(key).map(|v| !v.is_empty()).unwrap_or(false)
    }
}

/// Merges persisted overrides with environment defaults into the cached instance-config
/// response, and owns the writes that must invalidate it.
pub struct InstanceConfigService<S> {
    store: Arc<S>,
    cache: Arc<dyn ResponseCache>,
    defaults: ConfigDefaults,
    ttl: Duration,
}

impl<S> InstanceConfigService<S>
where
    S: InstanceStore + ConfigurationStore + WorkspaceStore + 'static,
{
    pub fn new(store: Arc<S>, cache: Arc<dyn ResponseCache>, defaults: ConfigDefaults, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            defaults,
            ttl,
        }
    }

    fn cache_key() -> CacheKey {
        CacheKey::anonymous(INSTANCE_CONFIG_PATH)
    }

    /// Public instance configuration, served from the cache while it is fresh.
    /// The instance row is read only on a miss; the not-activated body is never stored.
    pub async fn get_config(&self) -> Result<Value, InstanceConfigError> {
        get_or_compute(self.cache.as_ref(), Self::cache_key(), self.ttl, || self.compute_config()).await
    }

    async fn compute_config(&self) -> Result<Computed, InstanceConfigError> {
        match self.store.get_instance().await? {
            InstanceState::NotConfigured => Ok(Computed::Uncacheable(to_json(
                InstanceConfigResponse::not_activated(),
            )?)),
            InstanceState::Configured(instance) => {
                let response = self.build_config(instance).await?;
                Ok(Computed::Cacheable(to_json(response)?))
            }
        }
    }

    /// Compute the activated response without consulting the cache
    pub async fn build_config(&self, instance: Instance) -> Result<InstanceConfigResponse, InstanceConfigError> {
        let resolved = self.resolve_values().await?;

        let config = FeatureConfig {
            is_google_enabled: resolved.flag("IS_GOOGLE_ENABLED"),
            is_github_enabled: resolved.flag("IS_GITHUB_ENABLED"),
            is_magic_login_enabled: resolved.flag("ENABLE_MAGIC_LINK_LOGIN"),
            is_email_password_enabled: resolved.flag("ENABLE_EMAIL_PASSWORD"),
            github_app_name: resolved.raw("GITHUB_APP_NAME").unwrap_or_default(),
            slack_client_id: resolved.raw("SLACK_CLIENT_ID"),
            posthog_api_key: resolved.raw("POSTHOG_API_KEY"),
            posthog_host: resolved.raw("POSTHOG_HOST"),
            has_unsplash_configured: resolved.is_set("UNSPLASH_ACCESS_KEY"),
            has_openai_configured: resolved.is_set("OPENAI_API_KEY"),
            file_size_limit: self.defaults.file_size_limit(),
            is_smtp_configured: resolved.is_set("EMAIL_HOST")
                && resolved.is_set("EMAIL_HOST_USER")
                && resolved.is_set("EMAIL_HOST_PASSWORD"),
        };

        let workspaces_exist = self.store.count_workspaces().await? > 1;

        Ok(InstanceConfigResponse::Activated {
            config,
            instance: InstanceView {
                instance,
                workspaces_exist,
            },
        })
    }

    async fn resolve_values(&self) -> Result<ResolvedValues, InstanceConfigError> {
        let keys: Vec<&str> = INSTANCE_CONFIG_KEYS.iter().map(|(key, _)| *key).collect();
        let overrides = self.store.get_configuration_values(&keys).await?;

        let values = keys
            .iter()
            .map(|key| {
                let value = match overrides.get(*key) {
                    Some(value) => value.clone(),
                    None => self.defaults.get(key),
                };
                (key.to_string(), value)
            })
            .collect();

        Ok(ResolvedValues { values })
    }

    pub async fn ensure_instance_admin(&self, user: &UserContext) -> Result<(), InstanceConfigError> {
        let Some(user_id) = user.user_id.as_deref() else {
            return Err(InstanceConfigError::PermissionDenied);
        };
        if self.store.is_instance_admin(user_id).await? {
            Ok(())
        } else {
            Err(InstanceConfigError::PermissionDenied)
        }
    }

    /// Apply a partial update to the instance record, then drop the cached response
    pub async fn update_config(&self, body: &Value) -> Result<Instance, InstanceConfigError> {
        let patch = InstancePatch::from_json(body).map_err(InstanceConfigError::FieldErrors)?;

        // Only the patched columns are written, so concurrent patches of other fields survive
        let instance = self
            .store
            .apply_instance_patch(&patch)
            .await?
            .ok_or(InstanceConfigError::NotConfigured)?;
        log::info!("instance {} updated", instance.instance_id);

        self.invalidate().await;
        Ok(instance)
    }

    /// Record that the signup screen was shown. Repeated calls keep the flag set.
    pub async fn toggle_signup_screen_visited(&self) -> Result<(), InstanceConfigError> {
        if !self.store.mark_signup_screen_visited().await? {
            return Err(InstanceConfigError::NotConfigured);
        }
        self.invalidate().await;
        Ok(())
    }

    pub async fn list_configurations(&self) -> Result<Vec<ConfigurationEntry>, InstanceConfigError> {
        Ok(self.store.list_configurations().await?)
    }

    /// Upsert override rows from a `{KEY: value | null}` body
    pub async fn update_configurations(&self, body: &Value) -> Result<Vec<ConfigurationEntry>, InstanceConfigError> {
        let mut errors = FieldErrors::new();

        let Some(fields) = body.as_object() else {
            push_field_error(&mut errors, "non_field_errors", "Invalid data. Expected a dictionary.");
            return Err(InstanceConfigError::FieldErrors(errors));
        };

        let mut entries = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            if key.trim().is_empty() {
                push_field_error(&mut errors, "key", "This field may not be blank.");
                continue;
            }
            match value {
                Value::Null => entries.push(ConfigurationEntry::new(key, None)),
                Value::String(text) => entries.push(ConfigurationEntry::new(key, Some(text.clone()))),
                _ => push_field_error(&mut errors, key, "Not a valid string."),
            }
        }

        if !errors.is_empty() {
            return Err(InstanceConfigError::FieldErrors(errors));
        }

        let count = entries.len();
        self.store.upsert_configurations(entries).await?;
        log::info!("{} instance configuration value(s) updated", count);

        self.invalidate().await;
        self.list_configurations().await
    }

    /// Called only after the write it follows has been committed
    async fn invalidate(&self) {
        self.cache.invalidate(&Self::cache_key()).await;
        log::info!("invalidated cached {} response", INSTANCE_CONFIG_PATH);
    }
}
