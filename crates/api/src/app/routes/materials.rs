use std::sync::Arc;

use axum::{
    Json, Router,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};

use mfgplan_auth::permissions::{ROUTING_EDIT, ROUTING_VIEW};
use mfgplan_infra::catalog::NewMaterial;
use mfgplan_infra::{AuditAction, NewAuditEntry, record_action};

use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::UserContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_materials).post(create_material))
}

/// GET /materials
pub async fn list_materials(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, ROUTING_VIEW).await {
        return resp;
    }

    match services.catalog.materials().await {
        Ok(materials) => Json(materials).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /materials
pub async fn create_material(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewMaterial>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, ROUTING_EDIT).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_material(body).await {
        Ok(material) => {
            tracing::info!(material_id = %material.id, part_num = %material.part_num, "material created");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "materials", material.id)
                    .by(caller.user_id())
                    .after(&material),
            )
            .await;
            (StatusCode::CREATED, Json(material)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}
