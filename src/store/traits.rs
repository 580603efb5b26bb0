use std::collections::HashMap;

use crate::model::{
    ConfigurationEntry, Id, Instance, InstanceAdmin, InstancePatch, InstanceState, Project,
    ProjectIdentifier, Workspace,
};
use crate::store::StoreResult;

#[async_trait::async_trait]
pub trait WorkspaceStore: Send + Sync {
    async fn get_workspace(&self, id: &Id) -> StoreResult<Option<Workspace>>;
    /// Fails with `Conflict` when the slug is already used
    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace>;
    async fn count_workspaces(&self) -> StoreResult<i64>;
}

#[async_trait::async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, workspace_id: &Id, project_id: &Id) -> StoreResult<Option<Project>>;
    async fn list_projects_for_workspace(&self, workspace_id: &Id) -> StoreResult<Vec<Project>>;
    /// Registry row bound to `name` in the workspace, if any
    async fn find_project_identifier(
        &self,
        workspace_id: &Id,
        name: &str,
    ) -> StoreResult<Option<ProjectIdentifier>>;
    /// Registry row owned by the project, if any
    async fn get_identifier_for_project(&self, project_id: &Id) -> StoreResult<Option<ProjectIdentifier>>;
    /// Insert the project and its registry row as one unit.
    /// Fails with `Conflict` and persists nothing when the identifier is already bound.
    async fn create_project(&self, project: Project) -> StoreResult<Project>;
    /// Persist the project's fields. With `rename_registry`, the project's registry row (if one
    /// exists) is renamed to `project.identifier` in the same unit of work.
    /// Fails with `Conflict` and persists nothing when the identifier is already bound.
    async fn update_project(&self, project: Project, rename_registry: bool) -> StoreResult<Project>;
}

#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    async fn get_instance(&self) -> StoreResult<InstanceState>;
    /// Fails with `Conflict` when an instance is already registered
    async fn register_instance(&self, instance: Instance) -> StoreResult<Instance>;
    async fn save_instance(&self, instance: &Instance) -> StoreResult<()>;
    /// Write only the columns the patch names; `None` when no instance exists
    async fn apply_instance_patch(&self, patch: &InstancePatch) -> StoreResult<Option<Instance>>;
    /// Sets the visited flag; returns false when no instance exists
    async fn mark_signup_screen_visited(&self) -> StoreResult<bool>;
    async fn is_instance_admin(&self, user_id: &str) -> StoreResult<bool>;
    async fn add_instance_admin(&self, admin: InstanceAdmin) -> StoreResult<()>;
}

#[async_trait::async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Persisted overrides for the requested keys; keys without a row are absent from the map
    async fn get_configuration_values(&self, keys: &[&str]) -> StoreResult<HashMap<String, Option<String>>>;
    async fn list_configurations(&self) -> StoreResult<Vec<ConfigurationEntry>>;
    async fn upsert_configurations(&self, entries: Vec<ConfigurationEntry>) -> StoreResult<()>;
}

pub trait Store: WorkspaceStore + ProjectStore + InstanceStore + ConfigurationStore + Send + Sync {}
