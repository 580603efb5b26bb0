use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::handlers::{
    field_errors, not_found, parse_body, registry_error, store_error, ApiError, AppState,
    ListResponse,
};
use crate::logic::ProjectRegistry;
use crate::model::{Id, NewProject, NewWorkspace, Project, ProjectIdentifier, ProjectUpdate, Workspace};
use crate::store::traits::{ProjectStore, Store, WorkspaceStore};

#[derive(Debug, Deserialize)]
pub struct IdentifierQuery {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdentifierLookupResponse {
    pub exists: bool,
    pub identifiers: Vec<ProjectIdentifier>,
}

/// POST /workspaces
pub async fn create_workspace<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    RequestJson(body): RequestJson<Value>,
) -> Result<(StatusCode, Json<Workspace>), ApiError> {
    let draft: NewWorkspace = parse_body(body)?;
    let workspace = draft
        .into_workspace()
        .map_err(|errors| field_errors("Invalid workspace fields", errors))?;

    let workspace = ctx.store.create_workspace(workspace).await.map_err(store_error)?;
    log::info!("created workspace {} ({})", workspace.id, workspace.slug);
    Ok((StatusCode::CREATED, Json(workspace)))
}

/// GET /workspaces/:workspace_id
pub async fn get_workspace<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path(workspace_id): Path<Id>,
) -> Result<Json<Workspace>, ApiError> {
    match ctx.store.get_workspace(&workspace_id).await {
        Ok(Some(workspace)) => Ok(Json(workspace)),
        Ok(None) => Err(not_found("workspace")),
        Err(e) => Err(store_error(e)),
    }
}

/// GET /workspaces/:workspace_id/projects
pub async fn list_projects<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path(workspace_id): Path<Id>,
) -> Result<Json<ListResponse<Project>>, ApiError> {
    if ctx
        .store
        .get_workspace(&workspace_id)
        .await
        .map_err(store_error)?
        .is_none()
    {
        return Err(not_found("workspace"));
    }

    let projects = ctx
        .store
        .list_projects_for_workspace(&workspace_id)
        .await
        .map_err(store_error)?;
    Ok(Json(ListResponse::new(projects)))
}

/// POST /workspaces/:workspace_id/projects
pub async fn create_project<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path(workspace_id): Path<Id>,
    RequestJson(body): RequestJson<Value>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let draft: NewProject = parse_body(body)?;
    let project = ProjectRegistry::create_project(&*ctx.store, &workspace_id, draft)
        .await
        .map_err(registry_error)?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /workspaces/:workspace_id/projects/:project_id
pub async fn get_project<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path((workspace_id, project_id)): Path<(Id, Id)>,
) -> Result<Json<Project>, ApiError> {
    match ctx.store.get_project(&workspace_id, &project_id).await {
        Ok(Some(project)) => Ok(Json(project)),
        Ok(None) => Err(not_found("project")),
        Err(e) => Err(store_error(e)),
    }
}

/// PATCH /workspaces/:workspace_id/projects/:project_id
pub async fn update_project<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path((workspace_id, project_id)): Path<(Id, Id)>,
    RequestJson(body): RequestJson<Value>,
) -> Result<Json<Project>, ApiError> {
    let update: ProjectUpdate = parse_body(body)?;
    ProjectRegistry::update_project(&*ctx.store, &workspace_id, &project_id, update)
        .await
        .map(Json)
        .map_err(registry_error)
}

/// GET /workspaces/:workspace_id/project-identifiers?name=
pub async fn lookup_project_identifier<S: Store + 'static>(
    State(ctx): State<AppState<S>>,
    Path(workspace_id): Path<Id>,
    Query(query): Query<IdentifierQuery>,
) -> Result<Json<IdentifierLookupResponse>, ApiError> {
    let name = query.name.unwrap_or_default();
    let identifiers = ProjectRegistry::lookup_identifier(&*ctx.store, &workspace_id, &name)
        .await
        .map_err(registry_error)?;

    Ok(Json(IdentifierLookupResponse {
        exists: !identifiers.is_empty(),
        identifiers,
    }))
}
