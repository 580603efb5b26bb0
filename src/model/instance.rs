use crate::model::{generate_id, push_field_error, FieldErrors, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

const MAX_TEXT_LEN: usize = 255;

/// The single configuration record of one deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub id: Id,
    pub instance_name: String,
    pub instance_id: String,
    pub current_version: String,
    pub latest_version: Option<String>,
    pub domain: Option<String>,
    pub namespace: Option<String>,
    pub is_telemetry_enabled: bool,
    pub is_support_required: bool,
    pub is_setup_done: bool,
    pub is_signup_screen_visited: bool,
    pub is_verified: bool,
    pub last_checked_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Instance {
    pub fn new(instance_name: String, current_version: String) -> Self {
        let now = Utc::now();
        Self {
            id: generate_id(),
            instance_name,
            instance_id: generate_id(),
            current_version,
            latest_version: None,
            domain: None,
            namespace: None,
            is_telemetry_enabled: true,
            is_support_required: true,
            is_setup_done: false,
            is_signup_screen_visited: false,
            is_verified: false,
            last_checked_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a validated patch. `is_signup_screen_visited` only ever moves from false to true.
    pub fn apply_patch(&mut self, patch: &InstancePatch) {
        if let Some(instance_name) = &patch.instance_name {
            self.instance_name = instance_name.clone();
        }
        if let Some(domain) = &patch.domain {
            self.domain = domain.clone();
        }
        if let Some(namespace) = &patch.namespace {
            self.namespace = namespace.clone();
        }
        if let Some(value) = patch.is_telemetry_enabled {
            self.is_telemetry_enabled = value;
        }
        if let Some(value) = patch.is_support_required {
            self.is_support_required = value;
        }
        if let Some(value) = patch.is_setup_done {
            self.is_setup_done = value;
        }
        if let Some(value) = patch.is_signup_screen_visited {
            self.is_signup_screen_visited |= value;
        }
        if let Some(value) = patch.is_verified {
            self.is_verified = value;
        }
        self.updated_at = Utc::now();
    }
}

/// Whether the deployment has been registered yet
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceState {
    NotConfigured,
    Configured(Instance),
}

impl InstanceState {
    pub fn into_instance(self) -> Option<Instance> {
        match self {
            InstanceState::NotConfigured => None,
            InstanceState::Configured(instance) => Some(instance),
        }
    }
}

/// Partial update of the instance record.
/// `domain` and `namespace` use `Some(None)` for an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstancePatch {
    pub instance_name: Option<String>,
    pub domain: Option<Option<String>>,
    pub namespace: Option<Option<String>>,
    pub is_telemetry_enabled: Option<bool>,
    pub is_support_required: Option<bool>,
    pub is_setup_done: Option<bool>,
    pub is_signup_screen_visited: Option<bool>,
    pub is_verified: Option<bool>,
}

impl InstancePatch {
    /// Parse a request body field by field so type errors come back per field.
    /// Read-only and unknown fields are ignored.
    pub fn from_json(body: &Value) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let Some(fields) = body.as_object() else {
            push_field_error(
                &mut errors,
                "non_field_errors",
                "Invalid data. Expected a dictionary.",
            );
            return Err(errors);
        };

        let mut patch = InstancePatch::default();

        if let Some(value) = fields.get("instance_name") {
            match value.as_str().map(str::trim) {
                Some("") => push_field_error(&mut errors, "instance_name", "This field may not be blank."),
                Some(name) if name.chars().count() > MAX_TEXT_LEN => push_field_error(
                    &mut errors,
                    "instance_name",
                    format!("Ensure this field has no more than {} characters.", MAX_TEXT_LEN),
                ),
                Some(name) => patch.instance_name = Some(name.to_string()),
                None => push_field_error(&mut errors, "instance_name", "Not a valid string."),
            }
        }

        patch.domain = nullable_text(fields.get("domain"), "domain", &mut errors);
        patch.namespace = nullable_text(fields.get("namespace"), "namespace", &mut errors);
        patch.is_telemetry_enabled = boolean(fields.get("is_telemetry_enabled"), "is_telemetry_enabled", &mut errors);
        patch.is_support_required = boolean(fields.get("is_support_required"), "is_support_required", &mut errors);
        patch.is_setup_done = boolean(fields.get("is_setup_done"), "is_setup_done", &mut errors);
        patch.is_signup_screen_visited = boolean(
            fields.get("is_signup_screen_visited"),
            "is_signup_screen_visited",
            &mut errors,
        );
        patch.is_verified = boolean(fields.get("is_verified"), "is_verified", &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(patch)
    }
}

fn boolean(value: Option<&Value>, field: &str, errors: &mut FieldErrors) -> Option<bool> {
    match value? {
        Value::Bool(flag) => Some(*flag),
        _ => {
            push_field_error(errors, field, "Must be a valid boolean.");
            None
        }
    }
}

fn nullable_text(
    value: Option<&Value>,
    field: &str,
    errors: &mut FieldErrors,
) -> Option<Option<String>> {
    match value? {
        Value::Null => Some(None),
        Value::String(text) if text.chars().count() > MAX_TEXT_LEN => {
            push_field_error(
                errors,
                field,
                format!("Ensure this field has no more than {} characters.", MAX_TEXT_LEN),
            );
            None
        }
        Value::String(text) => Some(Some(text.clone())),
        _ => {
            push_field_error(errors, field, "Not a valid string.");
            None
        }
    }
}

/// A user holding the instance-admin capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceAdmin {
    pub id: Id,
    pub user_id: Id,
    pub role: i16,
    pub created_at: DateTime<Utc>,
}

impl InstanceAdmin {
    pub const ROLE_ADMIN: i16 = 20;

    pub fn new(user_id: Id) -> Self {
        Self {
            id: generate_id(),
            user_id,
            role: Self::ROLE_ADMIN,
            created_at: Utc::now(),
        }
    }
}
