use axum::{http::StatusCode, response::Json};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::logic::{InstanceConfigError, InstanceConfigService, RegistryError};
use crate::model::FieldErrors;
use crate::store::StoreError;

/// Shared state handed to every handler
pub struct AppContext<S> {
    pub store: Arc<S>,
    pub instance_config: InstanceConfigService<S>,
}

pub type AppState<S> = Arc<AppContext<S>>;

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl<T> ListResponse<T> {
    pub fn new(items: Vec<T>) -> Self {
        let total = items.len();
        Self { items, total }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl ErrorResponse {
    pub fn new(message: &str) -> Self {
        Self {
            error: message.to_string(),
            fields: None,
        }
    }

    pub fn with_fields(message: &str, fields: FieldErrors) -> Self {
        Self {
            error: message.to_string(),
            fields: Some(fields),
        }
    }
}

pub fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub fn field_errors(message: &str, fields: FieldErrors) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::with_fields(message, fields)),
    )
}

pub fn not_found(what: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new(&format!("{} not found", what))),
    )
}

pub fn internal_error(err: &dyn std::fmt::Display) -> ApiError {
    log::error!("request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Something went wrong please try again later")),
    )
}

/// Parse a raw JSON request body
pub fn parse_json(body: &[u8]) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| bad_request(&format!("Invalid JSON body: {}", e)))
}

/// Deserialize a request body, reporting shape errors as 400s
pub fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| bad_request(&format!("Invalid request body: {}", e)))
}

pub fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound(what) => not_found(&what),
        StoreError::Conflict(detail) => (StatusCode::CONFLICT, Json(ErrorResponse::new(&detail))),
        StoreError::Unexpected(err) => internal_error(&err),
    }
}

pub fn registry_error(err: RegistryError) -> ApiError {
    match err {
        RegistryError::Validation { field, message } => {
            let mut fields = FieldErrors::new();
            fields.insert(field, vec![message.clone()]);
            field_errors(&message, fields)
        }
        RegistryError::FieldErrors(fields) => field_errors("Invalid project fields", fields),
        RegistryError::NotFound(what) => not_found(&what),
        RegistryError::Store(err) => store_error(err),
    }
}

pub fn instance_config_error(err: InstanceConfigError) -> ApiError {
    match err {
        InstanceConfigError::NotConfigured => bad_request("Instance is not configured"),
        InstanceConfigError::FieldErrors(fields) => field_errors("Invalid instance fields", fields),
        InstanceConfigError::PermissionDenied => (
            StatusCode::FORBIDDEN,
            Json(ErrorResponse::new(&InstanceConfigError::PermissionDenied.to_string())),
        ),
        InstanceConfigError::Store(err) => store_error(err),
    }
}
