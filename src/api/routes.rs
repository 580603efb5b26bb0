use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::api::handlers::{self, AppState};
use crate::api::{instance_handlers, project_handlers};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Instance configuration
        .route(
            "/instance-config",
            get(instance_handlers::get_instance_config::<S>)
                .patch(instance_handlers::update_instance_config::<S>),
        )
        .route(
            "/instance-config/configurations",
            get(instance_handlers::list_configurations::<S>)
                .patch(instance_handlers::update_configurations::<S>),
        )
        .route(
            "/signup-screen-visited",
            post(instance_handlers::signup_screen_visited::<S>),
        )
        // Workspaces
        .route("/workspaces", post(project_handlers::create_workspace::<S>))
        .route(
            "/workspaces/:workspace_id",
            get(project_handlers::get_workspace::<S>),
        )
        // Projects and their identifiers
        .route(
            "/workspaces/:workspace_id/projects",
            get(project_handlers::list_projects::<S>).post(project_handlers::create_project::<S>),
        )
        .route(
            "/workspaces/:workspace_id/projects/:project_id",
            get(project_handlers::get_project::<S>).patch(project_handlers::update_project::<S>),
        )
        .route(
            "/workspaces/:workspace_id/project-identifiers",
            get(project_handlers::lookup_project_identifier::<S>),
        )
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
}
