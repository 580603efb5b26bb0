use serde::{Deserialize, Serialize};

/// Persisted override for one configuration key. A `None` value still overrides the default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    pub key: String,
    pub value: Option<String>,
    pub category: String,
}

impl ConfigurationEntry {
    pub fn new(key: &str, value: Option<String>) -> Self {
        let key = key.trim().to_uppercase();
        Self {
            category: category_for_key(&key).to_string(),
            key,
            value,
        }
    }
}

/// Group keys the way the admin screens present them
pub fn category_for_key(key: &str) -> &'static str {
    match key {
        "IS_GOOGLE_ENABLED" | "IS_GITHUB_ENABLED" | "GITHUB_APP_NAME" | "ENABLE_MAGIC_LINK_LOGIN"
        | "ENABLE_EMAIL_PASSWORD" => "AUTHENTICATION",
        k if k.starts_with("EMAIL_") => "SMTP",
        k if k.starts_with("SLACK_") => "SLACK",
        k if k.starts_with("POSTHOG_") => "ANALYTICS",
        "UNSPLASH_ACCESS_KEY" => "UNSPLASH",
        k if k.starts_with("OPENAI_") => "OPENAI",
        _ => "GENERAL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_normalizes_key_and_category() {
        let entry = ConfigurationEntry::new(" email_host ", Some("smtp.example.com".to_string()));
        assert_eq!(entry.key, "EMAIL_HOST");
        assert_eq!(entry.category, "SMTP");

        assert_eq!(category_for_key("IS_GITHUB_ENABLED"), "AUTHENTICATION");
        assert_eq!(category_for_key("SOMETHING_ELSE"), "GENERAL");
    }
}
