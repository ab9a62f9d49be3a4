//! HTTP rendering of access-control errors.

use axum::response::IntoResponse;
use http::StatusCode;
use rowguard_core::Error;

/// Status code a handler should answer with for `err`.
///
/// Denials are reported as 404 so that restricted rows do not leak their
/// existence; faults are server errors.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        Error::AccessDenied { .. } | Error::NotFound { .. } => StatusCode::NOT_FOUND,
        Error::UnknownEntityType(_)
        | Error::UnknownField { .. }
        | Error::ReadOnlyField(_)
        | Error::CustomThrough { .. }
        | Error::InvalidAllowList(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Builds a JSON error response for `err`.
pub fn error_response(err: &Error) -> axum::response::Response {
    let status = status_for(err);
    if status.is_server_error() {
        log::error!("Access-control fault: {err}");
    }
    let message = if status == StatusCode::NOT_FOUND {
        "not found".to_string()
    } else {
        err.to_string()
    };
    let body = serde_json::json!({
        "error": {
            "category": "access",
            "message": message,
        }
    });

    (
        status,
        [(http::header::CONTENT_TYPE, "application/json")],
        serde_json::to_string(&body).unwrap_or_default(),
    )
        .into_response()
}
