use crate::model::{deserialize_nullable, generate_id, push_field_error, FieldErrors, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Longest identifier a project may carry
pub const MAX_IDENTIFIER_LEN: usize = 12;
pub const MAX_NAME_LEN: usize = 255;

/// Secret projects are only visible to their members
pub const NETWORK_SECRET: i16 = 0;
pub const NETWORK_PUBLIC: i16 = 2;

/// Identifiers are compared and stored trimmed and upper-cased
pub fn normalize_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub description: String,
    /// Short workspace-unique code, e.g. "WEB"
    pub identifier: String,
    pub network: i16,
    pub emoji: Option<String>,
    pub cover_image: Option<String>,
    pub project_lead: Option<Id>,
    pub default_assignee: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    /// Apply every patch field except `identifier`, which only the registry may change
    pub fn apply_update(&mut self, update: &ProjectUpdate) {
        if let Some(name) = &update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = &update.description {
            self.description = description.clone();
        }
        if let Some(network) = update.network {
            self.network = network;
        }
        if let Some(emoji) = &update.emoji {
            self.emoji = emoji.clone();
        }
        if let Some(cover_image) = &update.cover_image {
            self.cover_image = cover_image.clone();
        }
        if let Some(project_lead) = &update.project_lead {
            self.project_lead = project_lead.clone();
        }
        if let Some(default_assignee) = &update.default_assignee {
            self.default_assignee = default_assignee.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Registry row binding an identifier to a project within a workspace.
/// `(name, workspace_id)` is unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectIdentifier {
    pub id: Id,
    pub name: String,
    pub workspace_id: Id,
    pub project_id: Id,
    pub created_at: DateTime<Utc>,
}

impl ProjectIdentifier {
    pub fn for_project(project: &Project) -> Self {
        Self {
            id: generate_id(),
            name: project.identifier.clone(),
            workspace_id: project.workspace_id.clone(),
            project_id: project.id.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Input model for creating a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub network: Option<i16>,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub project_lead: Option<Id>,
    #[serde(default)]
    pub default_assignee: Option<Id>,
}

impl NewProject {
    /// Validate every field except the identifier's presence, which the registry checks first
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        validate_name(&self.name, &mut errors);
        validate_identifier_length(&normalize_identifier(&self.identifier), &mut errors);
        if let Some(network) = self.network {
            validate_network(network, &mut errors);
        }
        errors
    }

    /// Build the project row. `identifier` must already be normalized.
    pub fn into_project(self, workspace_id: &Id, identifier: String) -> Project {
        let now = Utc::now();
        Project {
            id: generate_id(),
            workspace_id: workspace_id.clone(),
            name: self.name.trim().to_string(),
            description: self.description,
            identifier,
            network: self.network.unwrap_or(NETWORK_PUBLIC),
            emoji: self.emoji,
            cover_image: self.cover_image,
            project_lead: self.project_lead,
            default_assignee: self.default_assignee,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update of a project. Nullable fields use `Some(None)` for an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub network: Option<i16>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub emoji: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub cover_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub project_lead: Option<Option<Id>>,
    #[serde(default, deserialize_with = "deserialize_nullable")]
    pub default_assignee: Option<Option<Id>>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            validate_name(name, &mut errors);
        }
        if let Some(identifier) = &self.identifier {
            validate_identifier_length(&normalize_identifier(identifier), &mut errors);
        }
        if let Some(network) = self.network {
            validate_network(network, &mut errors);
        }
        errors
    }

    /// The normalized identifier requested by this patch, if any.
    /// Blank identifiers count as "not requested".
    pub fn requested_identifier(&self) -> Option<String> {
        self.identifier
            .as_deref()
            .map(normalize_identifier)
            .filter(|identifier| !identifier.is_empty())
    }
}

fn validate_name(name: &str, errors: &mut FieldErrors) {
    let name = name.trim();
    if name.is_empty() {
        push_field_error(errors, "name", "This field may not be blank.");
    } else if name.chars().count() > MAX_NAME_LEN {
        push_field_error(
            errors,
            "name",
            format!("Ensure this field has no more than {} characters.", MAX_NAME_LEN),
        );
    }
}

fn validate_identifier_length(identifier: &str, errors: &mut FieldErrors) {
    if identifier.chars().count() > MAX_IDENTIFIER_LEN {
        push_field_error(
            errors,
            "identifier",
            format!(
                "Ensure this field has no more than {} characters.",
                MAX_IDENTIFIER_LEN
            ),
        );
    }
}

fn validate_network(network: i16, errors: &mut FieldErrors) {
    if network != NETWORK_SECRET && network != NETWORK_PUBLIC {
        push_field_error(
            errors,
            "network",
            format!("\"{}\" is not a valid choice.", network),
        );
    }
}
