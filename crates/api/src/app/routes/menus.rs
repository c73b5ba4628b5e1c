//! The caller's navigation tree.

use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};

use mfgplan_menus::build_menu_tree;

use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::UserContext;

/// GET /menus - menu forest filtered by the caller's permissions
pub async fn my_menus(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    let caller = match authz::load_caller(&services, &user).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let menus = match services.catalog.menus().await {
        Ok(m) => m,
        Err(e) => return errors::domain_error_to_response(e),
    };

    let tree = build_menu_tree(
        &menus,
        caller.permissions.permission_ids(),
        caller.permissions.is_admin(),
    );
    tracing::debug!(
        user_id = %caller.user_id(),
        menus = menus.len(),
        roots = tree.len(),
        "built menu tree"
    );

    Json(tree).into_response()
}
