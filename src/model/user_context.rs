use serde::{Deserialize, Serialize};

/// Identity of the caller, extracted from request headers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub user_id: Option<String>,
    pub user_email: Option<String>,
}

impl UserContext {
    pub fn new(user_id: String) -> Self {
        Self {
            user_id: Some(user_id),
            user_email: None,
        }
    }

    pub fn with_details(user_id: String, email: Option<String>) -> Self {
        Self {
            user_id: Some(user_id),
            user_email: email,
        }
    }

    /// Caller that did not identify itself
    pub fn anonymous() -> Self {
        Self {
            user_id: None,
            user_email: None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
