use axum::Router;
use serde::{Deserialize, Deserializer};

pub mod admin;
pub mod auth;
pub mod club;
pub mod manage;
pub mod me;
pub mod notices;
pub mod notifications;
pub mod request;

pub fn app() -> Router {
    Router::new()
        .nest("/auth", auth::app())
        .nest("/club", club::app())
        .nest("/request", request::app())
        .nest("/me", me::app())
        .nest("/notices", notices::app())
        .nest("/notifications", notifications::app())
        .nest("/manage", manage::app())
        .nest("/admin", admin::app())
}

/// Treats a blank string field like an absent one.
pub(crate) fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Checks that a required text field has content, returning it trimmed.
pub(crate) fn required(field: &'static str, value: String) -> crate::error::AppResult<String> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(crate::error::AppError::bad_request(format!(
            "{field} is required"
        )));
    }
    Ok(value)
}
