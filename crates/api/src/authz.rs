//! API-side authorization guard.
//!
//! Permissions are resolved per request from the catalog, so role changes
//! take effect without re-issuing tokens.

use axum::http::StatusCode;
use axum::response::Response;

use mfgplan_auth::authorize;

use crate::app::errors::{self, domain_error_to_response};
use crate::app::services::AppServices;
use crate::context::{Caller, UserContext};

/// Load the caller and their effective permissions.
///
/// A token for a user that no longer exists yields 404.
pub async fn load_caller(services: &AppServices, ctx: &UserContext) -> Result<Caller, Response> {
    match services
        .catalog
        .effective_permissions(ctx.user_id())
        .await
        .map_err(domain_error_to_response)?
    {
        Some((user, permissions)) => Ok(Caller { user, permissions }),
        None => Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("user {} not found", ctx.user_id()),
        )),
    }
}

/// Load the caller and require `permission` (or `admin:all`).
pub async fn require(
    services: &AppServices,
    ctx: &UserContext,
    permission: &str,
) -> Result<Caller, Response> {
    let caller = load_caller(services, ctx).await?;
    if let Err(e) = authorize(&caller.permissions, permission) {
        tracing::info!(
            user_id = %caller.user_id(),
            permission,
            "authorization denied"
        );
        return Err(errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string()));
    }
    Ok(caller)
}
