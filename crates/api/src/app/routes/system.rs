use std::sync::Arc;

use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::services::AppServices;
use crate::authz;
use crate::context::UserContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let caller = match authz::load_caller(&services, &user).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    Json(serde_json::json!({
        "user": caller.user,
        "permissions": caller.permissions.permission_names(),
        "is_admin": caller.permissions.is_admin(),
    }))
    .into_response()
}
