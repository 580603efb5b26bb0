use thiserror::Error;

use crate::model::{
    normalize_identifier, FieldErrors, Id, NewProject, Project, ProjectIdentifier, ProjectUpdate,
};
use crate::store::traits::{ProjectStore, WorkspaceStore};
use crate::store::StoreError;

pub const IDENTIFIER_REQUIRED: &str = "Project Identifier is required";
pub const IDENTIFIER_TAKEN: &str = "Project Identifier is taken";
pub const IDENTIFIER_ALREADY_TAKEN: &str = "Project Identifier is already taken";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{message}")]
    Validation { field: String, message: String },
    #[error("invalid project fields")]
    FieldErrors(FieldErrors),
    #[error("{0} not found")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RegistryError {
    fn identifier(message: &str) -> Self {
        RegistryError::Validation {
            field: "identifier".to_string(),
            message: message.to_string(),
        }
    }
}

/// Keeps every project bound to exactly one workspace-unique identifier.
///
/// Lookups here only produce the friendly error; the store's unique constraints are the
/// final authority, and their conflicts are reported as the same "taken" errors.
pub struct ProjectRegistry;

impl ProjectRegistry {
    /// Create a project and bind its identifier in one unit of work
    pub async fn create_project<S: ProjectStore + WorkspaceStore>(
        store: &S,
        workspace_id: &Id,
        draft: NewProject,
    ) -> Result<Project, RegistryError> {
        if store.get_workspace(workspace_id).await?.is_none() {
            return Err(RegistryError::NotFound("workspace".to_string()));
        }

        let identifier = normalize_identifier(&draft.identifier);
        if identifier.is_empty() {
            return Err(RegistryError::identifier(IDENTIFIER_REQUIRED));
        }

        let errors = draft.validate();
        if !errors.is_empty() {
            return Err(RegistryError::FieldErrors(errors));
        }

        if store
            .find_project_identifier(workspace_id, &identifier)
            .await?
            .is_some()
        {
            return Err(RegistryError::identifier(IDENTIFIER_TAKEN));
        }

        let project = draft.into_project(workspace_id, identifier);
        match store.create_project(project).await {
            Ok(project) => {
                log::info!(
                    "created project {} with identifier {} in workspace {}",
                    project.id,
                    project.identifier,
                    workspace_id
                );
                Ok(project)
            }
            Err(StoreError::Conflict(detail)) => {
                log::debug!("identifier conflict on create: {}", detail);
                Err(RegistryError::identifier(IDENTIFIER_TAKEN))
            }
            Err(StoreError::NotFound(_)) => Err(RegistryError::NotFound("workspace".to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Apply a partial update, renaming the identifier binding when the patch asks for it.
    /// Nothing is persisted when any check fails.
    pub async fn update_project<S: ProjectStore>(
        store: &S,
        workspace_id: &Id,
        project_id: &Id,
        update: ProjectUpdate,
    ) -> Result<Project, RegistryError> {
        let mut project = store
            .get_project(workspace_id, project_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound("project".to_string()))?;

        let errors = update.validate();
        if !errors.is_empty() {
            return Err(RegistryError::FieldErrors(errors));
        }

        let Some(identifier) = update.requested_identifier() else {
            project.apply_update(&update);
            return Self::persist(store, project, false).await;
        };

        let rename_registry = match store
            .find_project_identifier(&project.workspace_id, &identifier)
            .await?
        {
            None => {
                if store.get_identifier_for_project(&project.id).await?.is_none() {
                    // Tolerated: the project row is renamed and no registry row is created
                    log::warn!(
                        "project {} has no identifier registry row; renaming to {} without one",
                        project.id,
                        identifier
                    );
                }
                true
            }
            Some(row) if row.project_id == project.id => false,
            Some(_) => return Err(RegistryError::identifier(IDENTIFIER_ALREADY_TAKEN)),
        };

        let previous = std::mem::replace(&mut project.identifier, identifier);
        project.apply_update(&update);
        let project = Self::persist(store, project, rename_registry).await?;

        if previous != project.identifier {
            log::info!(
                "renamed project {} identifier {} -> {}",
                project.id,
                previous,
                project.identifier
            );
        }
        Ok(project)
    }

    /// Registry rows bound to `name` in the workspace (empty when the name is free)
    pub async fn lookup_identifier<S: ProjectStore>(
        store: &S,
        workspace_id: &Id,
        name: &str,
    ) -> Result<Vec<ProjectIdentifier>, RegistryError> {
        let name = normalize_identifier(name);
        if name.is_empty() {
            return Err(RegistryError::identifier("Name is required"));
        }
        Ok(store
            .find_project_identifier(workspace_id, &name)
            .await?
            .into_iter()
            .collect())
    }

    async fn persist<S: ProjectStore>(
        store: &S,
        project: Project,
        rename_registry: bool,
    ) -> Result<Project, RegistryError> {
        match store.update_project(project, rename_registry).await {
            Ok(project) => Ok(project),
            Err(StoreError::Conflict(detail)) => {
                log::debug!("identifier conflict on update: {}", detail);
                Err(RegistryError::identifier(IDENTIFIER_ALREADY_TAKEN))
            }
            Err(StoreError::NotFound(_)) => Err(RegistryError::NotFound("project".to_string())),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Workspace;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn draft(name: &str, identifier: &str) -> NewProject {
        NewProject {
            name: name.to_string(),
            identifier: identifier.to_string(),
            description: String::new(),
            network: None,
            emoji: None,
            cover_image: None,
            project_lead: None,
            default_assignee: None,
        }
    }

    async fn store_with_workspace() -> (MemoryStore, Id) {
        let store = MemoryStore::new();
        let workspace = store
            .create_workspace(Workspace::new("Acme".to_string(), "acme".to_string()))
            .await
            .unwrap();
        (store, workspace.id)
    }

    fn assert_identifier_error(err: RegistryError, expected: &str) {
        match err {
            RegistryError::Validation { field, message } => {
                assert_eq!(field, "identifier");
                assert_eq!(message, expected);
            }
            other => panic!("expected identifier validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_normalizes_and_binds_identifier() {
        let (store, ws) = store_with_workspace().await;

        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "  web "))
            .await
            .unwrap();

        assert_eq!(project.identifier, "WEB");
        let row = store.find_project_identifier(&ws, "WEB").await.unwrap().unwrap();
        assert_eq!(row.project_id, project.id);
        assert_eq!(store.identifier_rows_for_project(&project.id), 1);
    }

    #[tokio::test]
    async fn test_create_with_blank_identifier_creates_nothing() {
        let (store, ws) = store_with_workspace().await;

        let err = ProjectRegistry::create_project(&store, &ws, draft("Website", "   "))
            .await
            .unwrap_err();

        assert_identifier_error(err, IDENTIFIER_REQUIRED);
        assert!(store.list_projects_for_workspace(&ws).await.unwrap().is_empty());
        assert_eq!(store.identifier_row_count(), 0);
    }

    #[tokio::test]
    async fn test_create_with_taken_identifier_creates_nothing() {
        let (store, ws) = store_with_workspace().await;
        ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        let err = ProjectRegistry::create_project(&store, &ws, draft("Web app", "web"))
            .await
            .unwrap_err();

        assert_identifier_error(err, IDENTIFIER_TAKEN);
        assert_eq!(store.list_projects_for_workspace(&ws).await.unwrap().len(), 1);
        assert_eq!(store.identifier_row_count(), 1);
    }

    #[tokio::test]
    async fn test_same_identifier_in_other_workspace_is_allowed() {
        let (store, ws) = store_with_workspace().await;
        let other = store
            .create_workspace(Workspace::new("Other".to_string(), "other".to_string()))
            .await
            .unwrap();

        ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();
        ProjectRegistry::create_project(&store, &other.id, draft("Website", "WEB"))
            .await
            .unwrap();

        assert_eq!(store.identifier_row_count(), 2);
    }

    #[tokio::test]
    async fn test_create_in_unknown_workspace() {
        let store = MemoryStore::new();
        let err = ProjectRegistry::create_project(&store, &"missing".to_string(), draft("Website", "WEB"))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rename_to_free_identifier_moves_binding() {
        let (store, ws) = store_with_workspace().await;
        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        let renamed = ProjectRegistry::update_project(
            &store,
            &ws,
            &project.id,
            ProjectUpdate {
                identifier: Some("site".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(renamed.identifier, "SITE");
        assert!(store.find_project_identifier(&ws, "WEB").await.unwrap().is_none());
        assert_eq!(
            store.find_project_identifier(&ws, "SITE").await.unwrap().unwrap().project_id,
            project.id
        );
        assert_eq!(store.identifier_rows_for_project(&project.id), 1);
    }

    #[tokio::test]
    async fn test_rename_to_own_identifier_succeeds() {
        let (store, ws) = store_with_workspace().await;
        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        let updated = ProjectRegistry::update_project(
            &store,
            &ws,
            &project.id,
            ProjectUpdate {
                identifier: Some(" web".to_string()),
                name: Some("Marketing site".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.identifier, "WEB");
        assert_eq!(updated.name, "Marketing site");
        assert_eq!(store.identifier_rows_for_project(&project.id), 1);
    }

    #[tokio::test]
    async fn test_blank_identifier_updates_other_fields_only() {
        let (store, ws) = store_with_workspace().await;
        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        let updated = ProjectRegistry::update_project(
            &store,
            &ws,
            &project.id,
            ProjectUpdate {
                identifier: Some("  ".to_string()),
                description: Some("Public site".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(updated.identifier, "WEB");
        assert_eq!(updated.description, "Public site");
    }

    #[tokio::test]
    async fn test_rename_to_identifier_of_other_project_changes_nothing() {
        let (store, ws) = store_with_workspace().await;
        let a = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();
        ProjectRegistry::create_project(&store, &ws, draft("Api", "API"))
            .await
            .unwrap();

        let err = ProjectRegistry::update_project(
            &store,
            &ws,
            &a.id,
            ProjectUpdate {
                identifier: Some("api".to_string()),
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert_identifier_error(err, IDENTIFIER_ALREADY_TAKEN);
        let stored = store.get_project(&ws, &a.id).await.unwrap().unwrap();
        assert_eq!(stored, a);
        assert_eq!(
            store.find_project_identifier(&ws, "WEB").await.unwrap().unwrap().project_id,
            a.id
        );
    }

    #[tokio::test]
    async fn test_rename_tolerates_missing_registry_row() {
        let (store, ws) = store_with_workspace().await;
        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();
        store.remove_identifier_for_project(&project.id);

        let renamed = ProjectRegistry::update_project(
            &store,
            &ws,
            &project.id,
            ProjectUpdate {
                identifier: Some("SITE".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(renamed.identifier, "SITE");
        assert_eq!(store.identifier_rows_for_project(&project.id), 0);
    }

    #[tokio::test]
    async fn test_invalid_update_fields_persist_nothing() {
        let (store, ws) = store_with_workspace().await;
        let project = ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        let err = ProjectRegistry::update_project(
            &store,
            &ws,
            &project.id,
            ProjectUpdate {
                identifier: Some("WAYTOOLONGIDENTIFIER".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RegistryError::FieldErrors(ref e) if e.contains_key("identifier")));
        assert_eq!(store.get_project(&ws, &project.id).await.unwrap().unwrap(), project);
    }

    #[tokio::test]
    async fn test_concurrent_creates_bind_identifier_once() {
        let (store, ws) = store_with_workspace().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let ws = ws.clone();
            handles.push(tokio::spawn(async move {
                ProjectRegistry::create_project(&*store, &ws, draft(&format!("Project {}", i), "DUP")).await
            }));
        }

        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(err) => assert_identifier_error(err, IDENTIFIER_TAKEN),
            }
        }

        assert_eq!(created, 1);
        assert_eq!(store.identifier_row_count(), 1);
        assert_eq!(store.list_projects_for_workspace(&ws).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_renames_to_same_identifier() {
        let (store, ws) = store_with_workspace().await;
        let store = Arc::new(store);
        let a = ProjectRegistry::create_project(&*store, &ws, draft("A", "AAA")).await.unwrap();
        let b = ProjectRegistry::create_project(&*store, &ws, draft("B", "BBB")).await.unwrap();

        let rename = |project_id: Id| {
            let store = store.clone();
            let ws = ws.clone();
            tokio::spawn(async move {
                ProjectRegistry::update_project(
                    &*store,
                    &ws,
                    &project_id,
                    ProjectUpdate {
                        identifier: Some("SHARED".to_string()),
                        ..Default::default()
                    },
                )
                .await
            })
        };

        let (first, second) = tokio::join!(rename(a.id.clone()), rename(b.id.clone()));
        let outcomes = [first.unwrap(), second.unwrap()];

        assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
        let holders: Vec<_> = store
            .list_projects_for_workspace(&ws)
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.identifier == "SHARED")
            .collect();
        assert_eq!(holders.len(), 1);
        let row = store.find_project_identifier(&ws, "SHARED").await.unwrap().unwrap();
        assert_eq!(row.project_id, holders[0].id);
    }

    #[tokio::test]
    async fn test_lookup_identifier() {
        let (store, ws) = store_with_workspace().await;
        ProjectRegistry::create_project(&store, &ws, draft("Website", "WEB"))
            .await
            .unwrap();

        assert_eq!(ProjectRegistry::lookup_identifier(&store, &ws, "web").await.unwrap().len(), 1);
        assert!(ProjectRegistry::lookup_identifier(&store, &ws, "API").await.unwrap().is_empty());
    }
}
