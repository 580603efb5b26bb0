use axum::{body::Bytes, extract::State, http::StatusCode, response::Json};
use serde_json::Value;

use crate::api::handlers::{instance_config_error, parse_json, ApiError, AppState, ListResponse};
use crate::model::{ConfigurationEntry, Instance, UserContext};
use crate::store::traits::Store;

/// GET /instance-config
/// Public, cached view of the instance and its enabled integrations
pub async fn get_instance_config<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
) -> Result<Json<Value>, ApiError> {
    ctx.instance_config
        .get_config()
        .await
        .map(Json)
        .map_err(instance_config_error)
}

/// PATCH /instance-config
/// The body is parsed only after the admin check, so callers without access always get 403
pub async fn update_instance_config<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    user: UserContext,
    body: Bytes,
) -> Result<Json<Instance>, ApiError> {
    ctx.instance_config
        .ensure_instance_admin(&user)
        .await
        .map_err(instance_config_error)?;
    let body = parse_json(&body)?;

    ctx.instance_config
        .update_config(&body)
        .await
        .map(Json)
        .map_err(instance_config_error)
}

/// POST /signup-screen-visited
pub async fn signup_screen_visited<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
) -> Result<StatusCode, ApiError> {
    ctx.instance_config
        .toggle_signup_screen_visited()
        .await
        .map_err(instance_config_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /instance-config/configurations
pub async fn list_configurations<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    user: UserContext,
) -> Result<Json<ListResponse<ConfigurationEntry>>, ApiError> {
    ctx.instance_config
        .ensure_instance_admin(&user)
        .await
        .map_err(instance_config_error)?;

    ctx.instance_config
        .list_configurations()
        .await
        .map(|entries| Json(ListResponse::new(entries)))
        .map_err(instance_config_error)
}

/// PATCH /instance-config/configurations
/// Body: `{"KEY": "value" | null, ...}`
pub async fn update_configurations<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    user: UserContext,
    body: Bytes,
) -> Result<Json<ListResponse<ConfigurationEntry>>, ApiError> {
    ctx.instance_config
        .ensure_instance_admin(&user)
        .await
        .map_err(instance_config_error)?;
    let body = parse_json(&body)?;

    ctx.instance_config
        .update_configurations(&body)
        .await
        .map(|entries| Json(ListResponse::new(entries)))
        .map_err(instance_config_error)
}
