//! Manufacturing process definitions (materials, routings, BOM) and the BOM
//! quantity resolver.
//!
//! Everything here is deterministic domain logic: no IO, no HTTP, no storage.
//! Quantities are fixed-point decimals so repeated planning runs never drift.

pub mod bom;
pub mod material;
pub mod routing;

pub use bom::{
    AlternateMaterial, BomError, BomItem, QTY_SCALE, RoundingMode, RoundingPolicy, SCRAP_SCALE,
    resolve_bom_requirement, resolve_bom_requirement_rounded,
};
pub use material::{Material, MaterialType};
pub use routing::{
    MaterialRequirement, MaterialTotal, Routing, RoutingOperation, RoutingStatus,
    resolve_routing_requirements, summarize_by_material,
};
