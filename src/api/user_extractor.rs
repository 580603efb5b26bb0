use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
};
use crate::model::UserContext;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

/// Axum extractor for UserContext from request headers
///
/// Authentication happens upstream; the proxy forwards the caller as:
/// - X-User-Id: user identifier
/// - X-User-Email: optional user email
///
/// Requests without X-User-Id are anonymous. Admin-only handlers reject them.
#[async_trait]
impl<S> FromRequestParts<S> for UserContext
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        Ok(user_from_headers(&parts.headers))
    }
}

fn user_from_headers(headers: &HeaderMap) -> UserContext {
    match extract_header_value(headers, USER_ID_HEADER) {
        Some(user_id) => {
            UserContext::with_details(user_id, extract_header_value(headers, USER_EMAIL_HEADER))
        }
        None => UserContext::anonymous(),
    }
}

/// Extract a non-blank header value as string
fn extract_header_value(headers: &HeaderMap, header_name: &str) -> Option<String> {
    headers
        .get(header_name)
        .and_then(|value| value.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
