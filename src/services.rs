//! Core business logic, separated from the HTTP layer for testability.
//!
//! Functions here take the shared [`AppState`](crate::app::AppState) and the
//! authenticated caller and return `Result<_, AppError>`; the axum handlers in
//! `api` only extract and serialize.

pub mod accounts;
pub mod activity;
pub mod badge;
pub mod banned;
pub mod emergency;
pub mod incidents;
pub mod sites;
pub mod subscription;
pub mod visitors;

/// Page size when the client does not ask for one.
pub const DEFAULT_LIMIT: i64 = 50;
/// Largest page a client may request.
pub const MAX_LIMIT: i64 = 200;

/// Normalize a client-supplied page size.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

/// Trim a string and turn blanks into `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Minimal shape check: something before and after a single `@`, and a dot in the domain.
pub fn looks_like_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}
