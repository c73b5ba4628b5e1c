//! Administration endpoints: permissions, roles, users, menus, audit trail.
//!
//! Every handler requires `user:manage` (or `admin:all`).

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};

use mfgplan_auth::permissions::USER_MANAGE;
use mfgplan_core::{RoleId, UserId};
use mfgplan_infra::catalog::{NewMenu, NewPermission, NewRole, NewUser, UserUpdate};
use mfgplan_infra::{AuditAction, NewAuditEntry, record_action};

use crate::app::dto::{AuditLogQuery, SetRolePermissionsRequest, SetUserRolesRequest};
use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::UserContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/menus", get(list_menus).post(create_menu))
        .route("/permissions", get(list_permissions).post(create_permission))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(get_role))
        .route("/roles/:id/permissions", put(set_role_permissions))
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(get_user).put(update_user))
        .route("/users/:id/roles", put(set_user_roles))
        .route("/audit-logs", get(list_audit_logs))
        .route("/audit-logs/user/:id", get(list_user_audit_logs))
}

// ─────────────────────────────────────────────────────────────────────────────
// Menus
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/menus - flat list of every menu row
pub async fn list_menus(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }

    match services.catalog.menus().await {
        Ok(menus) => Json(menus).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /admin/menus
pub async fn create_menu(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewMenu>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_menu(body).await {
        Ok(menu) => {
            tracing::info!(menu_id = %menu.id, name = %menu.name, "menu created");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "menus", menu.id)
                    .by(caller.user_id())
                    .after(&menu),
            )
            .await;
            (StatusCode::CREATED, Json(menu)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/permissions
pub async fn list_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }

    match services.catalog.permissions().await {
        Ok(permissions) => Json(permissions).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /admin/permissions
pub async fn create_permission(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewPermission>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_permission(body).await {
        Ok(permission) => {
            tracing::info!(permission = %permission.name, "permission created");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "permissions", permission.id)
                    .by(caller.user_id())
                    .after(&permission),
            )
            .await;
            (StatusCode::CREATED, Json(permission)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Roles
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/roles - roles with their permission ids
pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }

    match services.catalog.roles().await {
        Ok(roles) => Json(roles).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /admin/roles
pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewRole>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_role(body).await {
        Ok(role) => {
            tracing::info!(role_id = %role.id, name = %role.name, "role created");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "roles", role.id)
                    .by(caller.user_id())
                    .after(&role),
            )
            .await;
            (StatusCode::CREATED, Json(role)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /admin/roles/:id
pub async fn get_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }
    let role_id: RoleId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.role(role_id).await {
        Ok(Some(role)) => Json(role).into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("role {role_id} not found"),
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// PUT /admin/roles/:id/permissions - replace the role's permission set
pub async fn set_role_permissions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<SetRolePermissionsRequest>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let role_id: RoleId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let before = match services.catalog.role(role_id).await {
        Ok(role) => role,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .catalog
        .set_role_permissions(role_id, body.permission_ids)
        .await
    {
        Ok(role) => {
            tracing::info!(
                role_id = %role.id,
                permissions = role.permission_ids.len(),
                "role permissions replaced"
            );
            let mut entry = NewAuditEntry::new(AuditAction::Update, "roles", role.id)
                .by(caller.user_id())
                .after(&role);
            if let Some(before) = &before {
                entry = entry.before(before);
            }
            record_action(services.catalog.as_ref(), entry).await;
            Json(role).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/users
pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }

    match services.catalog.users().await {
        Ok(users) => Json(users).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /admin/users/:id - user record plus resolved permissions
pub async fn get_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }
    let user_id: UserId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.effective_permissions(user_id).await {
        Ok(Some((found, effective))) => Json(serde_json::json!({
            "user": found,
            "permissions": effective.permission_names(),
            "is_admin": effective.is_admin(),
        }))
        .into_response(),
        Ok(None) => errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("user {user_id} not found"),
        ),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /admin/users
pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewUser>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_user(body).await {
        Ok(created) => {
            tracing::info!(user_id = %created.id, username = %created.username, "user created");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "users", created.id)
                    .by(caller.user_id())
                    .after(&created),
            )
            .await;
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// PUT /admin/users/:id - partial profile update (full_name, email, is_active)
pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<UserUpdate>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id: UserId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let before = match services.catalog.user(user_id).await {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.update_user(user_id, body).await {
        Ok(updated) => {
            tracing::info!(
                user_id = %updated.id,
                is_active = updated.is_active,
                "user updated"
            );
            let mut entry = NewAuditEntry::new(AuditAction::Update, "users", updated.id)
                .by(caller.user_id())
                .after(&updated);
            if let Some(before) = &before {
                entry = entry.before(before);
            }
            record_action(services.catalog.as_ref(), entry).await;
            Json(updated).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// PUT /admin/users/:id/roles - replace the user's scoped role grants
pub async fn set_user_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<SetUserRolesRequest>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, USER_MANAGE).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let user_id: UserId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let before = match services.catalog.user(user_id).await {
        Ok(u) => u,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.set_user_grants(user_id, body.grants).await {
        Ok(updated) => {
            tracing::info!(
                user_id = %updated.id,
                grants = updated.grants.len(),
                "user roles replaced"
            );
            let mut entry = NewAuditEntry::new(AuditAction::Update, "user_roles", updated.id)
                .by(caller.user_id())
                .after(&updated.grants);
            if let Some(before) = &before {
                entry = entry.before(&before.grants);
            }
            record_action(services.catalog.as_ref(), entry).await;
            Json(updated).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Audit
// ─────────────────────────────────────────────────────────────────────────────

/// GET /admin/audit-logs?limit= - newest first
pub async fn list_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Query(query): Query<AuditLogQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }

    match services.catalog.audit_entries(None, query.limit()).await {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /admin/audit-logs/user/:id?limit= - entries recorded by one user, newest first
pub async fn list_user_audit_logs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Query(query): Query<AuditLogQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, USER_MANAGE).await {
        return resp;
    }
    let user_id: UserId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .catalog
        .audit_entries(Some(user_id), query.limit())
        .await
    {
        Ok(entries) => Json(entries).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}
