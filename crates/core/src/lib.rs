//! `mfgplan-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the `Entity` trait, and the shared domain error model.

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{
    AuditLogId, BomItemId, BusinessUnitId, MaterialId, MenuId, PermissionId, PlantId, RoleId,
    RoutingId, RoutingOperationId, UserId,
};
