use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mfgplan_auth::RoleGrant;
use mfgplan_core::{PermissionId, RoutingId};
use mfgplan_process::{MaterialRequirement, MaterialTotal, RoundingMode, RoundingPolicy};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct SetRolePermissionsRequest {
    pub permission_ids: Vec<PermissionId>,
}

#[derive(Debug, Deserialize)]
pub struct SetUserRolesRequest {
    pub grants: Vec<RoleGrant>,
}

#[derive(Debug, Deserialize)]
pub struct AuditLogQuery {
    pub limit: Option<usize>,
}

impl AuditLogQuery {
    pub const DEFAULT_LIMIT: usize = 100;
    pub const MAX_LIMIT: usize = 1000;

    pub fn limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }
}

/// `GET /routings/:id/requirements?qty=&scale=&mode=&summary=`
#[derive(Debug, Deserialize)]
pub struct RequirementsQuery {
    pub qty: Decimal,
    /// Decimal places to round to; omitted means exact.
    pub scale: Option<u32>,
    /// `half_up` (default), `half_even`, `up`, `down`.
    pub mode: Option<String>,
    #[serde(default)]
    pub summary: bool,
}

/// Largest scale a `Decimal` can carry.
const MAX_SCALE: u32 = 28;

impl RequirementsQuery {
    pub fn policy(&self) -> Result<RoundingPolicy, axum::response::Response> {
        let mode = match self.mode.as_deref() {
            None => None,
            Some(s) => Some(RoundingMode::from_str(s).map_err(errors::domain_error_to_response)?),
        };
        match (self.scale, mode) {
            (None, None) => Ok(RoundingPolicy::Exact),
            (None, Some(_)) => Err(errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                "mode requires scale",
            )),
            (Some(dp), _) if dp > MAX_SCALE => Err(errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                format!("scale must be at most {MAX_SCALE}"),
            )),
            (Some(dp), mode) => Ok(RoundingPolicy::Scale {
                dp,
                mode: mode.unwrap_or(RoundingMode::HalfUp),
            }),
        }
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct RequirementsResponse {
    pub routing_id: RoutingId,
    pub order_qty: Decimal,
    pub rounding: RoundingPolicy,
    pub requirements: Vec<MaterialRequirement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<Vec<MaterialTotal>>,
}
