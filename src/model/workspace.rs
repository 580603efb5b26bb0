use crate::model::{generate_id, push_field_error, FieldErrors, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level tenant that scopes projects and their identifiers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Id,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
}

impl Workspace {
    pub fn new(name: String, slug: String) -> Self {
        Self {
            id: generate_id(),
            name,
            slug,
            created_at: Utc::now(),
        }
    }
}

/// Input model for creating a new workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewWorkspace {
    pub name: String,
    pub slug: String,
}

impl NewWorkspace {
    /// Validate and convert to a full Workspace with server-generated fields.
    /// Slugs are lower-cased and may only contain ascii alphanumerics, `-` and `_`.
    pub fn into_workspace(self) -> Result<Workspace, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            push_field_error(&mut errors, "name", "This field may not be blank.");
        } else if name.chars().count() > 80 {
            push_field_error(&mut errors, "name", "Ensure this field has no more than 80 characters.");
        }

        let slug = self.slug.trim().to_lowercase();
        if slug.is_empty() {
            push_field_error(&mut errors, "slug", "This field may not be blank.");
        } else if slug.len() > 48 {
            push_field_error(&mut errors, "slug", "Ensure this field has no more than 48 characters.");
        } else if !slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            push_field_error(
                &mut errors,
                "slug",
                "Slug may only contain letters, numbers, hyphens and underscores.",
            );
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(Workspace::new(name, slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_workspace_normalizes_slug() {
        let workspace = NewWorkspace {
            name: " Acme ".to_string(),
            slug: "Acme-Team".to_string(),
        }
        .into_workspace()
        .unwrap();

        assert_eq!(workspace.name, "Acme");
        assert_eq!(workspace.slug, "acme-team");
    }

    #[test]
    fn test_new_workspace_rejects_bad_slug() {
        let errors = NewWorkspace {
            name: "".to_string(),
            slug: "acme team!".to_string(),
        }
        .into_workspace()
        .unwrap_err();

        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("slug"));
    }
}
