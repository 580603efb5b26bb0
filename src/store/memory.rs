use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::model::{
    ConfigurationEntry, Id, Instance, InstanceAdmin, InstancePatch, InstanceState, Project,
    ProjectIdentifier, Workspace,
};
use crate::store::traits::{ConfigurationStore, InstanceStore, ProjectStore, Store, WorkspaceStore};
use crate::store::{StoreError, StoreResult};

#[derive(Debug, Default)]
struct MemoryState {
    workspaces: HashMap<Id, Workspace>,
    projects: HashMap<Id, Project>,
    /// Registry rows keyed by (workspace_id, name), the unique pair
    identifiers: HashMap<(Id, String), ProjectIdentifier>,
    instance: Option<Instance>,
    admins: HashMap<Id, InstanceAdmin>,
    configurations: BTreeMap<String, ConfigurationEntry>,
}

impl MemoryState {
    /// Project other than `exclude` already holding `identifier` in the workspace
    fn identifier_owner(&self, workspace_id: &Id, identifier: &str, exclude: Option<&Id>) -> Option<Id> {
        if let Some(row) = self
            .identifiers
            .get(&(workspace_id.clone(), identifier.to_string()))
        {
            if Some(&row.project_id) != exclude {
                return Some(row.project_id.clone());
            }
        }

        self.projects
            .values()
            .find(|p| {
                &p.workspace_id == workspace_id
                    && p.identifier == identifier
                    && Some(&p.id) != exclude
            })
            .map(|p| p.id.clone())
    }
}

/// Process-local store with the same uniqueness rules as the Postgres schema.
/// Every write happens under a single lock, so multi-row writes are atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registry rows owned by the project
    pub fn identifier_rows_for_project(&self, project_id: &Id) -> usize {
        self.state
            .read()
            .identifiers
            .values()
            .filter(|row| &row.project_id == project_id)
            .count()
    }

    /// Total number of registry rows, used to assert nothing leaked
    pub fn identifier_row_count(&self) -> usize {
        self.state.read().identifiers.len()
    }

    /// Drop a project's registry row, simulating a pre-existing inconsistency
    pub fn remove_identifier_for_project(&self, project_id: &Id) {
        self.state
            .write()
            .identifiers
            .retain(|_, row| &row.project_id != project_id);
    }
}

#[async_trait::async_trait]
impl WorkspaceStore for MemoryStore {
    async fn get_workspace(&self, id: &Id) -> StoreResult<Option<Workspace>> {
        Ok(self.state.read().workspaces.get(id).cloned())
    }

    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace> {
        let mut state = self.state.write();
        if state.workspaces.values().any(|w| w.slug == workspace.slug) {
            return Err(StoreError::Conflict(format!(
                "workspace slug '{}' exists",
                workspace.slug
            )));
        }
        state.workspaces.insert(workspace.id.clone(), workspace.clone());
        Ok(workspace)
    }

    async fn count_workspaces(&self) -> StoreResult<i64> {
        Ok(self.state.read().workspaces.len() as i64)
    }
}

#[async_trait::async_trait]
impl ProjectStore for MemoryStore {
    async fn get_project(&self, workspace_id: &Id, project_id: &Id) -> StoreResult<Option<Project>> {
        Ok(self
            .state
            .read()
            .projects
            .get(project_id)
            .filter(|p| &p.workspace_id == workspace_id)
            .cloned())
    }

    async fn list_projects_for_workspace(&self, workspace_id: &Id) -> StoreResult<Vec<Project>> {
        let state = self.state.read();
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| &p.workspace_id == workspace_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn find_project_identifier(
        &self,
        workspace_id: &Id,
        name: &str,
    ) -> StoreResult<Option<ProjectIdentifier>> {
        Ok(self
            .state
            .read()
            .identifiers
            .get(&(workspace_id.clone(), name.to_string()))
            .cloned())
    }

    async fn get_identifier_for_project(&self, project_id: &Id) -> StoreResult<Option<ProjectIdentifier>> {
        Ok(self
            .state
            .read()
            .identifiers
            .values()
            .find(|row| &row.project_id == project_id)
            .cloned())
    }

    async fn create_project(&self, project: Project) -> StoreResult<Project> {
        let mut state = self.state.write();
        if !state.workspaces.contains_key(&project.workspace_id) {
            return Err(StoreError::NotFound(format!("workspace {}", project.workspace_id)));
        }
        if state
            .identifier_owner(&project.workspace_id, &project.identifier, None)
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "identifier '{}' is bound in workspace {}",
                project.identifier, project.workspace_id
            )));
        }

        let row = ProjectIdentifier::for_project(&project);
        state
            .identifiers
            .insert((row.workspace_id.clone(), row.name.clone()), row);
        state.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn update_project(&self, project: Project, rename_registry: bool) -> StoreResult<Project> {
        let mut state = self.state.write();
        if !state.projects.contains_key(&project.id) {
            return Err(StoreError::NotFound(format!("project {}", project.id)));
        }
        if state
            .identifier_owner(&project.workspace_id, &project.identifier, Some(&project.id))
            .is_some()
        {
            return Err(StoreError::Conflict(format!(
                "identifier '{}' is bound in workspace {}",
                project.identifier, project.workspace_id
            )));
        }

        if rename_registry {
            let current_key = state
                .identifiers
                .iter()
                .find(|(_, row)| row.project_id == project.id)
                .map(|(key, _)| key.clone());
            if let Some(key) = current_key {
                let removed = state.identifiers.remove(&key);
                if let Some(mut row) = removed {
                    row.name = project.identifier.clone();
                    state
                        .identifiers
                        .insert((row.workspace_id.clone(), row.name.clone()), row);
                }
            }
        }

        state.projects.insert(project.id.clone(), project.clone());
        Ok(project)
    }
}

#[async_trait::async_trait]
impl InstanceStore for MemoryStore {
    async fn get_instance(&self) -> StoreResult<InstanceState> {
        Ok(match &self.state.read().instance {
            Some(instance) => InstanceState::Configured(instance.clone()),
            None => InstanceState::NotConfigured,
        })
    }

    async fn register_instance(&self, instance: Instance) -> StoreResult<Instance> {
        let mut state = self.state.write();
        if state.instance.is_some() {
            return Err(StoreError::Conflict("instance is already registered".to_string()));
        }
        state.instance = Some(instance.clone());
        Ok(instance)
    }

    async fn save_instance(&self, instance: &Instance) -> StoreResult<()> {
        let mut state = self.state.write();
        match state.instance.as_mut() {
            Some(current) if current.id == instance.id => {
                let visited = current.is_signup_screen_visited || instance.is_signup_screen_visited;
                *current = instance.clone();
                current.is_signup_screen_visited = visited;
                Ok(())
            }
            _ => Err(StoreError::NotFound(format!("instance {}", instance.id))),
        }
    }

    async fn apply_instance_patch(&self, patch: &InstancePatch) -> StoreResult<Option<Instance>> {
        let mut state = self.state.write();
        Ok(state.instance.as_mut().map(|instance| {
            instance.apply_patch(patch);
            instance.clone()
        }))
    }

    async fn mark_signup_screen_visited(&self) -> StoreResult<bool> {
        let mut state = self.state.write();
        let Some(instance) = state.instance.as_mut() else {
            return Ok(false);
        };
        instance.is_signup_screen_visited = true;
        instance.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn is_instance_admin(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .state
            .read()
            .admins
            .values()
            .any(|admin| admin.user_id == user_id))
    }

    async fn add_instance_admin(&self, admin: InstanceAdmin) -> StoreResult<()> {
        let mut state = self.state.write();
        if state.admins.values().any(|a| a.user_id == admin.user_id) {
            return Ok(());
        }
        state.admins.insert(admin.id.clone(), admin);
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for MemoryStore {
    async fn get_configuration_values(&self, keys: &[&str]) -> StoreResult<HashMap<String, Option<String>>> {
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|key| {
                state
                    .configurations
                    .get(*key)
                    .map(|entry| (entry.key.clone(), entry.value.clone()))
            })
            .collect())
    }

    async fn list_configurations(&self) -> StoreResult<Vec<ConfigurationEntry>> {
        Ok(self.state.read().configurations.values().cloned().collect())
    }

    async fn upsert_configurations(&self, entries: Vec<ConfigurationEntry>) -> StoreResult<()> {
        let mut state = self.state.write();
        for entry in entries {
            state.configurations.insert(entry.key.clone(), entry);
        }
        Ok(())
    }
}

impl Store for MemoryStore {}
