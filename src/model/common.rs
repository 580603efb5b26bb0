use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Field-level validation messages keyed by field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Record a validation message against a field
pub fn push_field_error(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.into());
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`) in patch bodies.
/// Use together with `#[serde(default)]`.
pub fn deserialize_nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
