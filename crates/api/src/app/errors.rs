use core::str::FromStr;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use mfgplan_core::DomainError;
use mfgplan_process::BomError;

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound(what) => {
            json_error(StatusCode::NOT_FOUND, "not_found", format!("{what} not found"))
        }
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        DomainError::Storage(msg) => {
            tracing::error!(error = %msg, "catalog storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

/// Parse a path segment into a typed id, answering `400 invalid_id` on failure.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(domain_error_to_response)
}

pub fn bom_error_to_response(err: BomError) -> axum::response::Response {
    match err {
        BomError::InvalidBomConfiguration(msg) => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "invalid_bom_configuration",
            msg,
        ),
        BomError::Overflow(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "quantity_overflow", msg)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
