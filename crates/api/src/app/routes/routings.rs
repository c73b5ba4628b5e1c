//! Routings with nested operations and BOM items, plus requirement
//! resolution for an order quantity.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use rust_decimal::Decimal;

use mfgplan_auth::permissions::{ROUTING_EDIT, ROUTING_VIEW};
use mfgplan_core::RoutingId;
use mfgplan_infra::catalog::{NewRouting, RoutingUpdate};
use mfgplan_infra::{AuditAction, NewAuditEntry, record_action};
use mfgplan_process::{BomError, Routing, resolve_routing_requirements, summarize_by_material};

use crate::app::dto::{RequirementsQuery, RequirementsResponse};
use crate::app::{errors, services::AppServices};
use crate::authz;
use crate::context::UserContext;

// ─────────────────────────────────────────────────────────────────────────────
// Router
// ─────────────────────────────────────────────────────────────────────────────

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_routings).post(create_routing))
        .route(
            "/:id",
            get(get_routing).put(update_routing).delete(delete_routing),
        )
        .route("/:id/requirements", get(requirements))
}

async fn find_routing(
    services: &AppServices,
    routing_id: RoutingId,
) -> Result<Routing, axum::response::Response> {
    match services.catalog.routing(routing_id).await {
        Ok(Some(routing)) => Ok(routing),
        Ok(None) => Err(errors::json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("routing {routing_id} not found"),
        )),
        Err(e) => Err(errors::domain_error_to_response(e)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /routings
pub async fn list_routings(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, ROUTING_VIEW).await {
        return resp;
    }

    match services.catalog.routings().await {
        Ok(routings) => Json(routings).into_response(),
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// POST /routings - routing with operations and BOM items in one request
pub async fn create_routing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Json(body): Json<NewRouting>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, ROUTING_EDIT).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match services.catalog.create_routing(body).await {
        Ok(routing) => {
            tracing::info!(
                routing_id = %routing.id,
                product = %routing.product_part_num,
                version = %routing.version,
                operations = routing.operations.len(),
                "routing created"
            );
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Create, "routings", routing.id)
                    .by(caller.user_id())
                    .after(&routing),
            )
            .await;
            (StatusCode::CREATED, Json(routing)).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /routings/:id
pub async fn get_routing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, ROUTING_VIEW).await {
        return resp;
    }
    let routing_id: RoutingId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match find_routing(&services, routing_id).await {
        Ok(routing) => Json(routing).into_response(),
        Err(resp) => resp,
    }
}

/// PUT /routings/:id - partial update; `operations`, when present, replaces them all
pub async fn update_routing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Json(body): Json<RoutingUpdate>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, ROUTING_EDIT).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let routing_id: RoutingId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let before = match find_routing(&services, routing_id).await {
        Ok(routing) => routing,
        Err(resp) => return resp,
    };

    match services.catalog.update_routing(routing_id, body).await {
        Ok(routing) => {
            tracing::info!(
                routing_id = %routing.id,
                version = %routing.version,
                operations = routing.operations.len(),
                "routing updated"
            );
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Update, "routings", routing.id)
                    .by(caller.user_id())
                    .before(&before)
                    .after(&routing),
            )
            .await;
            Json(routing).into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// DELETE /routings/:id - removes operations and BOM items with it
pub async fn delete_routing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let caller = match authz::require(&services, &user, ROUTING_EDIT).await {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let routing_id: RoutingId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let before = match find_routing(&services, routing_id).await {
        Ok(routing) => routing,
        Err(resp) => return resp,
    };

    match services.catalog.delete_routing(routing_id).await {
        Ok(()) => {
            tracing::info!(routing_id = %routing_id, "routing deleted");
            record_action(
                services.catalog.as_ref(),
                NewAuditEntry::new(AuditAction::Delete, "routings", routing_id)
                    .by(caller.user_id())
                    .before(&before),
            )
            .await;
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => errors::domain_error_to_response(e),
    }
}

/// GET /routings/:id/requirements?qty=&scale=&mode=&summary=
pub async fn requirements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(user): Extension<UserContext>,
    Path(id): Path<String>,
    Query(query): Query<RequirementsQuery>,
) -> axum::response::Response {
    if let Err(resp) = authz::require(&services, &user, ROUTING_VIEW).await {
        return resp;
    }
    let routing_id: RoutingId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let policy = match query.policy() {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if query.qty < Decimal::ZERO {
        return errors::bom_error_to_response(BomError::InvalidBomConfiguration(format!(
            "output quantity cannot be negative (got {})",
            query.qty
        )));
    }

    let routing = match find_routing(&services, routing_id).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };

    let requirements = match resolve_routing_requirements(&routing, query.qty, policy) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(routing_id = %routing_id, error = %e, "requirement resolution failed");
            return errors::bom_error_to_response(e);
        }
    };

    let totals = if query.summary {
        match summarize_by_material(&requirements) {
            Ok(t) => Some(t),
            Err(e) => return errors::bom_error_to_response(e),
        }
    } else {
        None
    };

    Json(RequirementsResponse {
        routing_id,
        order_qty: query.qty,
        rounding: policy,
        requirements,
        totals,
    })
    .into_response()
}
