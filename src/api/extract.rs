//! `Json` and `Query` extractors whose rejections go through `AppError`, so a
//! malformed body or query string gets the same 400 `{error, fields}` shape as
//! any other validation failure.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts};

use crate::error::{AppError, FieldError};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(err) => {
                AppError::Validation(vec![field_error_from_detail(&err.body_text(), "body")])
            }
            JsonRejection::JsonSyntaxError(_) => {
                AppError::Validation(vec![FieldError::new("body", "is not valid JSON")])
            }
            JsonRejection::MissingJsonContentType(_) => AppError::Validation(vec![FieldError::new(
                "body",
                "must be sent as application/json",
            )]),
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        match rejection {
            QueryRejection::FailedToDeserializeQueryString(err) => {
                AppError::Validation(vec![field_error_from_detail(&err.body_text(), "query")])
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

/// Pull the serde path out of a rejection text shaped like
/// `<context>: <path>: <message>` (the path is absent for root-level errors).
fn field_error_from_detail(detail: &str, fallback: &str) -> FieldError {
    let detail = detail.split_once(": ").map_or(detail, |(_, rest)| rest);

    let (path, message) = match detail.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(' ') => (Some(path), message),
        _ => (None, detail),
    };

    if let Some(missing) = missing_field_name(message) {
        let field = match path {
            Some(path) => format!("{path}.{missing}"),
            None => missing.to_string(),
        };
        return FieldError::new(&field, "is required");
    }

    FieldError::new(path.unwrap_or(fallback), message)
}

fn missing_field_name(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split_once('`').map(|(name, _)| name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_names_the_field() {
        let err = field_error_from_detail(
            "Failed to deserialize the JSON body into the target type: name: invalid type: integer `5`, expected a string at line 1 column 9",
            "body",
        );
        assert_eq!(err.field, "name");
        assert!(err.message.starts_with("invalid type"));
    }

    #[test]
    fn test_unknown_variant_in_query() {
        let err = field_error_from_detail(
            "Failed to deserialize query string: status: unknown variant `bogus`, expected one of `open`, `investigating`",
            "query",
        );
        assert_eq!(err.field, "status");
        assert!(err.message.contains("bogus"));
    }

    #[test]
    fn test_missing_field_at_root() {
        let err = field_error_from_detail(
            "Failed to deserialize the JSON body into the target type: missing field `status` at line 1 column 2",
            "body",
        );
        assert_eq!(err, FieldError::new("status", "is required"));
    }

    #[test]
    fn test_unparseable_detail_falls_back() {
        let err = field_error_from_detail("Failed to deserialize query string: trailing garbage", "query");
        assert_eq!(err.field, "query");
        assert_eq!(err.message, "trailing garbage");
    }
}
