use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, postgres::PgRow, PgPool, Row};
use std::collections::HashMap;

use crate::model::{
    ConfigurationEntry, Id, Instance, InstanceAdmin, InstancePatch, InstanceState, Project,
    ProjectIdentifier, Workspace,
};
use crate::store::traits::{ConfigurationStore, InstanceStore, ProjectStore, Store, WorkspaceStore};
use crate::store::{StoreError, StoreResult};

const PROJECT_COLUMNS: &str = "id, workspace_id, name, description, identifier, network, emoji, \
     cover_image, project_lead, default_assignee, created_at, updated_at";

const INSTANCE_COLUMNS: &str = "id, instance_name, instance_id, current_version, latest_version, \
     domain, namespace, is_telemetry_enabled, is_support_required, is_setup_done, \
     is_signup_screen_visited, is_verified, last_checked_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

fn workspace_from_row(row: &PgRow) -> StoreResult<Workspace> {
    Ok(Workspace {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        created_at: row.try_get("created_at")?,
    })
}

fn project_from_row(row: &PgRow) -> StoreResult<Project> {
    Ok(Project {
        id: row.try_get("id")?,
        workspace_id: row.try_get("workspace_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        identifier: row.try_get("identifier")?,
        network: row.try_get("network")?,
        emoji: row.try_get("emoji")?,
        cover_image: row.try_get("cover_image")?,
        project_lead: row.try_get("project_lead")?,
        default_assignee: row.try_get("default_assignee")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn identifier_from_row(row: &PgRow) -> StoreResult<ProjectIdentifier> {
    Ok(ProjectIdentifier {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        workspace_id: row.try_get("workspace_id")?,
        project_id: row.try_get("project_id")?,
        created_at: row.try_get("created_at")?,
    })
}

fn instance_from_row(row: &PgRow) -> StoreResult<Instance> {
    Ok(Instance {
        id: row.try_get("id")?,
        instance_name: row.try_get("instance_name")?,
        instance_id: row.try_get("instance_id")?,
        current_version: row.try_get("current_version")?,
        latest_version: row.try_get("latest_version")?,
        domain: row.try_get("domain")?,
        namespace: row.try_get("namespace")?,
        is_telemetry_enabled: row.try_get("is_telemetry_enabled")?,
        is_support_required: row.try_get("is_support_required")?,
        is_setup_done: row.try_get("is_setup_done")?,
        is_signup_screen_visited: row.try_get("is_signup_screen_visited")?,
        is_verified: row.try_get("is_verified")?,
        last_checked_at: row.try_get("last_checked_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait::async_trait]
impl WorkspaceStore for PostgresStore {
    async fn get_workspace(&self, id: &Id) -> StoreResult<Option<Workspace>> {
        let row = sqlx::query("SELECT id, name, slug, created_at FROM workspaces WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(workspace_from_row).transpose()
    }

    async fn create_workspace(&self, workspace: Workspace) -> StoreResult<Workspace> {
        sqlx::query("INSERT INTO workspaces (id, name, slug, created_at) VALUES ($1, $2, $3, $4)")
            .bind(&workspace.id)
            .bind(&workspace.name)
            .bind(&workspace.slug)
            .bind(workspace.created_at)
            .execute(&self.pool)
            .await?;

        Ok(workspace)
    }

    async fn count_workspaces(&self) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM workspaces")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait::async_trait]
impl ProjectStore for PostgresStore {
    async fn get_project(&self, workspace_id: &Id, project_id: &Id) -> StoreResult<Option<Project>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM projects WHERE workspace_id = $1 AND id = $2",
            PROJECT_COLUMNS
        ))
        .bind(workspace_id)
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(project_from_row).transpose()
    }

    async fn list_projects_for_workspace(&self, workspace_id: &Id) -> StoreResult<Vec<Project>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM projects WHERE workspace_id = $1 ORDER BY created_at",
            PROJECT_COLUMNS
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(project_from_row).collect()
    }

    async fn find_project_identifier(
        &self,
        workspace_id: &Id,
        name: &str,
    ) -> StoreResult<Option<ProjectIdentifier>> {
        let row = sqlx::query(
            "SELECT id, name, workspace_id, project_id, created_at FROM project_identifiers \
             WHERE workspace_id = $1 AND name = $2",
        )
        .bind(workspace_id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(identifier_from_row).transpose()
    }

    async fn get_identifier_for_project(&self, project_id: &Id) -> StoreResult<Option<ProjectIdentifier>> {
        let row = sqlx::query(
            "SELECT id, name, workspace_id, project_id, created_at FROM project_identifiers \
             WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(identifier_from_row).transpose()
    }

    async fn create_project(&self, project: Project) -> StoreResult<Project> {
        // Dropping the transaction on any error rolls back both inserts
        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO projects ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
            PROJECT_COLUMNS
        ))
        .bind(&project.id)
        .bind(&project.workspace_id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.identifier)
        .bind(project.network)
        .bind(&project.emoji)
        .bind(&project.cover_image)
        .bind(&project.project_lead)
        .bind(&project.default_assignee)
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await?;

        let registry_row = ProjectIdentifier::for_project(&project);
        sqlx::query(
            "INSERT INTO project_identifiers (id, name, workspace_id, project_id, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&registry_row.id)
        .bind(&registry_row.name)
        .bind(&registry_row.workspace_id)
        .bind(&registry_row.project_id)
        .bind(registry_row.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    async fn update_project(&self, project: Project, rename_registry: bool) -> StoreResult<Project> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE projects SET name = $2, description = $3, identifier = $4, network = $5, \
             emoji = $6, cover_image = $7, project_lead = $8, default_assignee = $9, updated_at = $10 \
             WHERE id = $1",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.description)
        .bind(&project.identifier)
        .bind(project.network)
        .bind(&project.emoji)
        .bind(&project.cover_image)
        .bind(&project.project_lead)
        .bind(&project.default_assignee)
        .bind(project.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("project {}", project.id)));
        }

        if rename_registry {
            let renamed = sqlx::query("UPDATE project_identifiers SET name = $1 WHERE project_id = $2")
                .bind(&project.identifier)
                .bind(&project.id)
                .execute(&mut *tx)
                .await?;
            if renamed.rows_affected() == 0 {
                log::warn!(
                    "project {} has no identifier registry row; left unbound on rename to {}",
                    project.id,
                    project.identifier
                );
            }
        }

        tx.commit().await?;
        Ok(project)
    }
}

#[async_trait::async_trait]
impl InstanceStore for PostgresStore {
    async fn get_instance(&self) -> StoreResult<InstanceState> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM instances ORDER BY created_at LIMIT 1",
            INSTANCE_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(InstanceState::Configured(instance_from_row(&row)?)),
            None => Ok(InstanceState::NotConfigured),
        }
    }

    async fn register_instance(&self, instance: Instance) -> StoreResult<Instance> {
        sqlx::query(&format!(
            "INSERT INTO instances ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
            INSTANCE_COLUMNS
        ))
        .bind(&instance.id)
        .bind(&instance.instance_name)
        .bind(&instance.instance_id)
        .bind(&instance.current_version)
        .bind(&instance.latest_version)
        .bind(&instance.domain)
        .bind(&instance.namespace)
        .bind(instance.is_telemetry_enabled)
        .bind(instance.is_support_required)
        .bind(instance.is_setup_done)
        .bind(instance.is_signup_screen_visited)
        .bind(instance.is_verified)
        .bind(instance.last_checked_at)
        .bind(instance.created_at)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(instance)
    }

    async fn save_instance(&self, instance: &Instance) -> StoreResult<()> {
        // The visited flag is OR-ed so a concurrent toggle is never undone
        let result = sqlx::query(
            "UPDATE instances SET instance_name = $2, domain = $3, namespace = $4, \
             is_telemetry_enabled = $5, is_support_required = $6, is_setup_done = $7, \
             is_signup_screen_visited = is_signup_screen_visited OR $8, is_verified = $9, \
             updated_at = $10 WHERE id = $1",
        )
        .bind(&instance.id)
        .bind(&instance.instance_name)
        .bind(&instance.domain)
        .bind(&instance.namespace)
        .bind(instance.is_telemetry_enabled)
        .bind(instance.is_support_required)
        .bind(instance.is_setup_done)
        .bind(instance.is_signup_screen_visited)
        .bind(instance.is_verified)
        .bind(instance.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("instance {}", instance.id)));
        }
        Ok(())
    }

    async fn apply_instance_patch(&self, patch: &InstancePatch) -> StoreResult<Option<Instance>> {
        // Absent fields keep the stored column; the visited flag is only ever raised
        let row = sqlx::query(&format!(
            "UPDATE instances SET \
             instance_name = COALESCE($1, instance_name), \
             domain = CASE WHEN $2 THEN $3 ELSE domain END, \
             namespace = CASE WHEN $4 THEN $5 ELSE namespace END, \
             is_telemetry_enabled = COALESCE($6, is_telemetry_enabled), \
             is_support_required = COALESCE($7, is_support_required), \
             is_setup_done = COALESCE($8, is_setup_done), \
             is_signup_screen_visited = is_signup_screen_visited OR COALESCE($9, FALSE), \
             is_verified = COALESCE($10, is_verified), \
             updated_at = NOW() \
             RETURNING {}",
            INSTANCE_COLUMNS
        ))
        .bind(&patch.instance_name)
        .bind(patch.domain.is_some())
        .bind(patch.domain.clone().flatten())
        .bind(patch.namespace.is_some())
        .bind(patch.namespace.clone().flatten())
        .bind(patch.is_telemetry_enabled)
        .bind(patch.is_support_required)
        .bind(patch.is_setup_done)
        .bind(patch.is_signup_screen_visited)
        .bind(patch.is_verified)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(instance_from_row).transpose()
    }

    async fn mark_signup_screen_visited(&self) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE instances SET is_signup_screen_visited = TRUE, updated_at = NOW()",
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_instance_admin(&self, user_id: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM instance_admins WHERE user_id = $1)")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn add_instance_admin(&self, admin: InstanceAdmin) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO instance_admins (id, user_id, role, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(&admin.id)
        .bind(&admin.user_id)
        .bind(admin.role)
        .bind(admin.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConfigurationStore for PostgresStore {
    async fn get_configuration_values(&self, keys: &[&str]) -> StoreResult<HashMap<String, Option<String>>> {
        let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        let rows = sqlx::query("SELECT key, value FROM instance_configurations WHERE key = ANY($1)")
            .bind(&keys)
            .fetch_all(&self.pool)
            .await?;

        let mut values = HashMap::with_capacity(rows.len());
        for row in rows {
            values.insert(row.try_get("key")?, row.try_get("value")?);
        }
        Ok(values)
    }

    async fn list_configurations(&self) -> StoreResult<Vec<ConfigurationEntry>> {
        let rows = sqlx::query("SELECT key, value, category FROM instance_configurations ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<ConfigurationEntry> {
                Ok(ConfigurationEntry {
                    key: row.try_get("key")?,
                    value: row.try_get("value")?,
                    category: row.try_get("category")?,
                })
            })
            .collect()
    }

    async fn upsert_configurations(&self, entries: Vec<ConfigurationEntry>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for entry in &entries {
            sqlx::query(
                "INSERT INTO instance_configurations (key, value, category, updated_at) \
                 VALUES ($1, $2, $3, NOW()) \
                 ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value, \
                 category = EXCLUDED.category, updated_at = NOW()",
            )
            .bind(&entry.key)
            .bind(&entry.value)
            .bind(&entry.category)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl Store for PostgresStore {}
