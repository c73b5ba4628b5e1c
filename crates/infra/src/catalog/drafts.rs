//! Insert payloads: records without store-assigned identifiers.

use rust_decimal::Decimal;
use serde::Deserialize;

use mfgplan_auth::{Permission, Role, RoleGrant, User};
use mfgplan_core::{
    BomItemId, DomainResult, MaterialId, MenuId, PermissionId, PlantId, RoleId, RoutingId,
    RoutingOperationId, UserId,
};
use mfgplan_menus::Menu;
use mfgplan_process::{
    AlternateMaterial, BomItem, Material, MaterialType, Routing, RoutingOperation, RoutingStatus,
};

fn yes() -> bool {
    true
}

fn decimal_one() -> Decimal {
    Decimal::ONE
}

fn pcs() -> String {
    "pcs".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermission {
    pub name: String,
    pub description: Option<String>,
}

impl NewPermission {
    pub fn named(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: Some(description.into()),
        }
    }

    pub fn into_permission(self, id: PermissionId) -> DomainResult<Permission> {
        mfgplan_auth::permissions::validate_permission_name(&self.name)?;
        Ok(Permission {
            id,
            name: self.name,
            description: self.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
}

impl NewRole {
    pub fn into_role(self, id: RoleId) -> DomainResult<Role> {
        let mut role = Role::new(id, self.name).with_permissions(self.permission_ids);
        role.description = self.description;
        role.validate()?;
        Ok(role)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default)]
    pub grants: Vec<RoleGrant>,
}

impl NewUser {
    pub fn into_user(self, id: UserId) -> DomainResult<User> {
        let user = User {
            id,
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            is_active: self.is_active,
            grants: self.grants,
        };
        user.validate()?;
        Ok(user)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMenu {
    pub parent_id: Option<MenuId>,
    pub name: String,
    pub route: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub order_num: i32,
    pub required_permission_id: Option<PermissionId>,
}

impl NewMenu {
    pub fn into_menu(self, id: MenuId) -> DomainResult<Menu> {
        let menu = Menu {
            id,
            parent_id: self.parent_id,
            name: self.name,
            route: self.route,
            icon: self.icon,
            order_num: self.order_num,
            required_permission_id: self.required_permission_id,
        };
        menu.validate()?;
        Ok(menu)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMaterial {
    pub part_num: String,
    pub material_type: MaterialType,
    pub name: Option<String>,
    pub description: Option<String>,
    pub uom: String,
}

impl NewMaterial {
    pub fn into_material(self, id: MaterialId) -> DomainResult<Material> {
        let material = Material {
            id,
            part_num: self.part_num,
            material_type: self.material_type,
            name: self.name,
            description: self.description,
            uom: self.uom,
        };
        material.validate()?;
        Ok(material)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBomItem {
    pub material_id: MaterialId,
    pub quantity: Decimal,
    pub uom: String,
    #[serde(default = "decimal_one")]
    pub base_qty: Decimal,
    #[serde(default = "pcs")]
    pub base_uom: String,
    #[serde(default = "decimal_one")]
    pub multiplier: Decimal,
    #[serde(default)]
    pub scrap_pct: Decimal,
    #[serde(default)]
    pub alternates: Vec<AlternateMaterial>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewOperation {
    pub step_num: i32,
    pub name: String,
    pub semi_part_num: Option<String>,
    #[serde(default)]
    pub bom_items: Vec<NewBomItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRouting {
    pub product_part_num: String,
    pub plant_id: PlantId,
    pub version: String,
    #[serde(default)]
    pub status: RoutingStatus,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub operations: Vec<NewOperation>,
}

impl NewRouting {
    /// Material ids referenced by BOM items and their alternates.
    pub fn material_ids(&self) -> Vec<MaterialId> {
        referenced_materials(&self.operations)
    }

    /// Assign identifiers, round BOM quantities to stored precision and validate.
    pub fn into_routing(
        self,
        id: RoutingId,
        next_op_id: impl FnMut() -> RoutingOperationId,
        next_item_id: impl FnMut() -> BomItemId,
    ) -> DomainResult<Routing> {
        let routing = Routing {
            id,
            product_part_num: self.product_part_num,
            plant_id: self.plant_id,
            version: self.version,
            status: self.status,
            is_default: self.is_default,
            operations: build_operations(self.operations, next_op_id, next_item_id),
        };
        routing.validate()?;
        Ok(routing)
    }
}

fn build_operations(
    operations: Vec<NewOperation>,
    mut next_op_id: impl FnMut() -> RoutingOperationId,
    mut next_item_id: impl FnMut() -> BomItemId,
) -> Vec<RoutingOperation> {
    operations
        .into_iter()
        .map(|op| RoutingOperation {
            id: next_op_id(),
            step_num: op.step_num,
            name: op.name,
            semi_part_num: op.semi_part_num,
            bom_items: op
                .bom_items
                .into_iter()
                .map(|item| {
                    BomItem {
                        id: next_item_id(),
                        material_id: item.material_id,
                        quantity: item.quantity,
                        uom: item.uom,
                        base_qty: item.base_qty,
                        base_uom: item.base_uom,
                        multiplier: item.multiplier,
                        scrap_pct: item.scrap_pct,
                        alternates: item.alternates,
                        notes: item.notes,
                    }
                    .normalized()
                })
                .collect(),
        })
        .collect()
}

fn referenced_materials(operations: &[NewOperation]) -> Vec<MaterialId> {
    let mut ids = Vec::new();
    for op in operations {
        for item in &op.bom_items {
            ids.push(item.material_id);
            ids.extend(item.alternates.iter().map(|a| a.material_id));
        }
    }
    ids.sort();
    ids.dedup();
    ids
}

// ─────────────────────────────────────────────────────────────────────────────
// Updates
// ─────────────────────────────────────────────────────────────────────────────

/// Partial user update. Absent fields keep their stored value; grants are
/// replaced separately.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn apply(self, mut user: User) -> DomainResult<User> {
        if let Some(full_name) = self.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(email) = self.email {
            user.email = Some(email);
        }
        if let Some(is_active) = self.is_active {
            user.is_active = is_active;
        }
        user.validate()?;
        Ok(user)
    }
}

/// Partial routing update. A present `operations` list replaces every
/// operation and BOM item; the replacements get fresh identifiers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoutingUpdate {
    pub version: Option<String>,
    pub status: Option<RoutingStatus>,
    pub is_default: Option<bool>,
    pub operations: Option<Vec<NewOperation>>,
}

impl RoutingUpdate {
    /// Material ids referenced by replacement operations.
    pub fn material_ids(&self) -> Vec<MaterialId> {
        self.operations
            .as_deref()
            .map(referenced_materials)
            .unwrap_or_default()
    }

    pub fn apply(
        self,
        mut routing: Routing,
        next_op_id: impl FnMut() -> RoutingOperationId,
        next_item_id: impl FnMut() -> BomItemId,
    ) -> DomainResult<Routing> {
        if let Some(version) = self.version {
            routing.version = version;
        }
        if let Some(status) = self.status {
            routing.status = status;
        }
        if let Some(is_default) = self.is_default {
            routing.is_default = is_default;
        }
        if let Some(operations) = self.operations {
            routing.operations = build_operations(operations, next_op_id, next_item_id);
        }
        routing.validate()?;
        Ok(routing)
    }
}
