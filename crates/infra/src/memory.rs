//! In-memory catalog for dev and tests.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use mfgplan_auth::{Permission, Role, RoleGrant, User, user::validate_grants};
use mfgplan_core::{
    AuditLogId, BomItemId, DomainError, DomainResult, MaterialId, PermissionId, RoleId,
    RoutingId, RoutingOperationId, UserId,
};
use mfgplan_menus::Menu;
use mfgplan_process::{Material, Routing};

use crate::audit::{AuditEntry, NewAuditEntry};
use crate::catalog::{
    Catalog, NewMaterial, NewMenu, NewPermission, NewRole, NewRouting, NewUser, RoutingUpdate,
    UserUpdate,
};
use crate::store::Table;

#[derive(Debug, Default)]
struct State {
    permissions: Table<Permission>,
    roles: Table<Role>,
    users: Table<User>,
    menus: Table<Menu>,
    materials: Table<Material>,
    routings: Table<Routing>,
    audit: Table<AuditEntry>,
    last_operation_id: i64,
    last_bom_item_id: i64,
}

impl State {
    fn check_permissions_exist(&self, ids: &[PermissionId]) -> DomainResult<()> {
        match ids.iter().find(|id| !self.permissions.contains(**id)) {
            Some(id) => Err(DomainError::validation(format!("unknown permission {id}"))),
            None => Ok(()),
        }
    }

    fn check_grants(&self, grants: &[RoleGrant]) -> DomainResult<()> {
        validate_grants(grants)?;
        match grants.iter().find(|g| !self.roles.contains(g.role_id)) {
            Some(g) => Err(DomainError::validation(format!("unknown role {}", g.role_id))),
            None => Ok(()),
        }
    }

    fn check_materials_exist(&self, ids: &[MaterialId]) -> DomainResult<()> {
        match ids.iter().find(|id| !self.materials.contains(**id)) {
            Some(id) => Err(DomainError::validation(format!("unknown material {id}"))),
            None => Ok(()),
        }
    }
}

/// Catalog held entirely in process memory.
///
/// Writes take a single write lock, so each call is atomic with respect to
/// every other call. A poisoned lock surfaces as `DomainError::Storage`.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    state: RwLock<State>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> DomainResult<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| DomainError::storage("catalog lock poisoned"))
    }

    fn write(&self) -> DomainResult<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| DomainError::storage("catalog lock poisoned"))
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn permissions(&self) -> DomainResult<Vec<Permission>> {
        Ok(self.read()?.permissions.list())
    }

    async fn create_permission(&self, draft: NewPermission) -> DomainResult<Permission> {
        let mut state = self.write()?;
        if state.permissions.values().any(|p| p.name == draft.name) {
            return Err(DomainError::conflict(format!(
                "permission '{}' already exists",
                draft.name
            )));
        }
        state.permissions.insert_next(|id| draft.into_permission(id))
    }

    async fn roles(&self) -> DomainResult<Vec<Role>> {
        Ok(self.read()?.roles.list())
    }

    async fn create_role(&self, draft: NewRole) -> DomainResult<Role> {
        let mut state = self.write()?;
        if state.roles.values().any(|r| r.name == draft.name) {
            return Err(DomainError::conflict(format!(
                "role '{}' already exists",
                draft.name
            )));
        }
        state.check_permissions_exist(&draft.permission_ids)?;
        state.roles.insert_next(|id| draft.into_role(id))
    }

    async fn set_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: Vec<PermissionId>,
    ) -> DomainResult<Role> {
        let mut state = self.write()?;
        state.check_permissions_exist(&permission_ids)?;
        let role = state
            .roles
            .get_mut(role_id)
            .ok_or_else(|| DomainError::not_found(format!("role {role_id}")))?;
        role.set_permissions(permission_ids);
        Ok(role.clone())
    }

    async fn users(&self) -> DomainResult<Vec<User>> {
        Ok(self.read()?.users.list())
    }

    async fn user(&self, user_id: UserId) -> DomainResult<Option<User>> {
        Ok(self.read()?.users.get(user_id).cloned())
    }

    async fn create_user(&self, draft: NewUser) -> DomainResult<User> {
        let mut state = self.write()?;
        if state.users.values().any(|u| u.username == draft.username) {
            return Err(DomainError::conflict(format!(
                "username '{}' is taken",
                draft.username
            )));
        }
        state.check_grants(&draft.grants)?;
        state.users.insert_next(|id| draft.into_user(id))
    }

    async fn update_user(&self, user_id: UserId, update: UserUpdate) -> DomainResult<User> {
        let mut state = self.write()?;
        let current = state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        let user = update.apply(current)?;
        state.users.insert(user.clone());
        Ok(user)
    }

    async fn set_user_grants(&self, user_id: UserId, grants: Vec<RoleGrant>) -> DomainResult<User> {
        let mut state = self.write()?;
        if !state.users.contains(user_id) {
            return Err(DomainError::not_found(format!("user {user_id}")));
        }
        state.check_grants(&grants)?;
        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        user.grants = grants;
        Ok(user.clone())
    }

    async fn menus(&self) -> DomainResult<Vec<Menu>> {
        Ok(self.read()?.menus.list())
    }

    async fn create_menu(&self, draft: NewMenu) -> DomainResult<Menu> {
        let mut state = self.write()?;
        if let Some(parent_id) = draft.parent_id {
            if !state.menus.contains(parent_id) {
                return Err(DomainError::validation(format!(
                    "unknown parent menu {parent_id}"
                )));
            }
        }
        if let Some(permission_id) = draft.required_permission_id {
            state.check_permissions_exist(&[permission_id])?;
        }
        state.menus.insert_next(|id| draft.into_menu(id))
    }

    async fn materials(&self) -> DomainResult<Vec<Material>> {
        Ok(self.read()?.materials.list())
    }

    async fn create_material(&self, draft: NewMaterial) -> DomainResult<Material> {
        let mut state = self.write()?;
        if state.materials.values().any(|m| m.part_num == draft.part_num) {
            return Err(DomainError::conflict(format!(
                "part number '{}' already exists",
                draft.part_num
            )));
        }
        state.materials.insert_next(|id| draft.into_material(id))
    }

    async fn routings(&self) -> DomainResult<Vec<Routing>> {
        Ok(self.read()?.routings.list())
    }

    async fn routing(&self, routing_id: RoutingId) -> DomainResult<Option<Routing>> {
        Ok(self.read()?.routings.get(routing_id).cloned())
    }

    async fn create_routing(&self, draft: NewRouting) -> DomainResult<Routing> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        if state.routings.values().any(|r| {
            r.product_part_num == draft.product_part_num
                && r.plant_id == draft.plant_id
                && r.version == draft.version
        }) {
            return Err(DomainError::conflict(format!(
                "routing {} v{} already exists for plant {}",
                draft.product_part_num, draft.version, draft.plant_id
            )));
        }
        state.check_materials_exist(&draft.material_ids())?;

        // Child sequences only advance once the routing is accepted.
        let mut op_seq = state.last_operation_id;
        let mut item_seq = state.last_bom_item_id;
        let routing = state.routings.insert_next(|id| {
            draft.into_routing(
                id,
                || {
                    op_seq += 1;
                    RoutingOperationId::new(op_seq)
                },
                || {
                    item_seq += 1;
                    BomItemId::new(item_seq)
                },
            )
        })?;
        state.last_operation_id = op_seq;
        state.last_bom_item_id = item_seq;
        Ok(routing)
    }

    async fn update_routing(
        &self,
        routing_id: RoutingId,
        update: RoutingUpdate,
    ) -> DomainResult<Routing> {
        let mut guard = self.write()?;
        let state = &mut *guard;
        let current = state
            .routings
            .get(routing_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("routing {routing_id}")))?;
        state.check_materials_exist(&update.material_ids())?;

        let mut op_seq = state.last_operation_id;
        let mut item_seq = state.last_bom_item_id;
        let routing = update.apply(
            current,
            || {
                op_seq += 1;
                RoutingOperationId::new(op_seq)
            },
            || {
                item_seq += 1;
                BomItemId::new(item_seq)
            },
        )?;
        if state.routings.values().any(|r| {
            r.id != routing.id
                && r.product_part_num == routing.product_part_num
                && r.plant_id == routing.plant_id
                && r.version == routing.version
        }) {
            return Err(DomainError::conflict(format!(
                "routing {} v{} already exists for plant {}",
                routing.product_part_num, routing.version, routing.plant_id
            )));
        }
        state.last_operation_id = op_seq;
        state.last_bom_item_id = item_seq;
        state.routings.insert(routing.clone());
        Ok(routing)
    }

    async fn delete_routing(&self, routing_id: RoutingId) -> DomainResult<()> {
        self.write()?
            .routings
            .remove(routing_id)
            .map(|_| ())
            .ok_or_else(|| DomainError::not_found(format!("routing {routing_id}")))
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditEntry> {
        let mut state = self.write()?;
        state
            .audit
            .insert_next(|id: AuditLogId| Ok(entry.stamped(id, Utc::now())))
    }

    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> DomainResult<Vec<AuditEntry>> {
        Ok(self
            .read()?
            .audit
            .values()
            .rev()
            .filter(|e| user_id.is_none() || e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfgplan_process::MaterialType;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::catalog::{NewBomItem, NewOperation};

    fn material(part_num: &str) -> NewMaterial {
        NewMaterial {
            part_num: part_num.to_string(),
            material_type: MaterialType::Raw,
            name: None,
            description: None,
            uom: "kg".to_string(),
        }
    }

    fn routing_with(material_id: MaterialId, version: &str) -> NewRouting {
        NewRouting {
            product_part_num: "FG-100".to_string(),
            plant_id: mfgplan_core::PlantId::new(1),
            version: version.to_string(),
            status: Default::default(),
            is_default: true,
            operations: vec![NewOperation {
                step_num: 10,
                name: "Mix".to_string(),
                semi_part_num: None,
                bom_items: vec![NewBomItem {
                    material_id,
                    quantity: dec!(0.1234567),
                    uom: "kg".to_string(),
                    base_qty: Decimal::ONE,
                    base_uom: "pcs".to_string(),
                    multiplier: Decimal::ONE,
                    scrap_pct: dec!(0.05),
                    alternates: vec![],
                    notes: None,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn duplicate_permission_name_conflicts() {
        let catalog = InMemoryCatalog::new();
        catalog
            .create_permission(NewPermission::named("plan:view", "View plans"))
            .await
            .unwrap();
        let err = catalog
            .create_permission(NewPermission::named("plan:view", "again"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn role_with_unknown_permission_is_rejected() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .create_role(NewRole {
                name: "Planner".to_string(),
                description: None,
                permission_ids: vec![PermissionId::new(42)],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert!(catalog.roles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_role_permissions_replaces_the_set() {
        let catalog = InMemoryCatalog::new();
        let view = catalog
            .create_permission(NewPermission::named("plan:view", "View"))
            .await
            .unwrap();
        let edit = catalog
            .create_permission(NewPermission::named("plan:edit", "Edit"))
            .await
            .unwrap();
        let role = catalog
            .create_role(NewRole {
                name: "Planner".to_string(),
                description: None,
                permission_ids: vec![view.id],
            })
            .await
            .unwrap();

        let updated = catalog
            .set_role_permissions(role.id, vec![edit.id, edit.id])
            .await
            .unwrap();
        assert_eq!(updated.permission_ids, vec![edit.id]);

        let err = catalog
            .set_role_permissions(RoleId::new(99), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn user_grants_must_reference_known_roles() {
        let catalog = InMemoryCatalog::new();
        let user = catalog
            .create_user(NewUser {
                username: "planner1".to_string(),
                full_name: None,
                email: Some("planner1@example.com".to_string()),
                is_active: true,
                grants: vec![],
            })
            .await
            .unwrap();

        let err = catalog
            .set_user_grants(user.id, vec![RoleGrant::unscoped(RoleId::new(3))])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = catalog
            .create_user(NewUser {
                username: "planner1".to_string(),
                full_name: None,
                email: None,
                is_active: true,
                grants: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn effective_permissions_follow_role_grants() {
        let catalog = InMemoryCatalog::new();
        let view = catalog
            .create_permission(NewPermission::named("routing:view", "View"))
            .await
            .unwrap();
        let role = catalog
            .create_role(NewRole {
                name: "Viewer".to_string(),
                description: None,
                permission_ids: vec![view.id],
            })
            .await
            .unwrap();
        let user = catalog
            .create_user(NewUser {
                username: "viewer".to_string(),
                full_name: None,
                email: None,
                is_active: true,
                grants: vec![RoleGrant::unscoped(role.id)],
            })
            .await
            .unwrap();

        let (_, effective) = catalog
            .effective_permissions(user.id)
            .await
            .unwrap()
            .unwrap();
        assert!(effective.has("routing:view"));
        assert!(!effective.is_admin());

        assert!(catalog
            .effective_permissions(UserId::new(404))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn menu_parent_must_exist() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .create_menu(NewMenu {
                parent_id: Some(mfgplan_core::MenuId::new(7)),
                name: "Orphan".to_string(),
                route: None,
                icon: None,
                order_num: 0,
                required_permission_id: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn routing_assigns_ids_and_normalizes_quantities() {
        let catalog = InMemoryCatalog::new();
        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();

        let routing = catalog
            .create_routing(routing_with(steel.id, "1"))
            .await
            .unwrap();
        let item = &routing.operations[0].bom_items[0];
        assert_eq!(routing.id.get(), 1);
        assert_eq!(routing.operations[0].id.get(), 1);
        assert_eq!(item.id.get(), 1);
        assert_eq!(item.quantity, dec!(0.123457));

        let err = catalog
            .create_routing(routing_with(steel.id, "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let second = catalog
            .create_routing(routing_with(steel.id, "2"))
            .await
            .unwrap();
        assert_eq!(second.operations[0].bom_items[0].id.get(), 2);
    }

    #[tokio::test]
    async fn routing_with_unknown_material_is_rejected() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .create_routing(routing_with(MaterialId::new(5), "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn delete_routing_reports_missing() {
        let catalog = InMemoryCatalog::new();
        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();
        let routing = catalog
            .create_routing(routing_with(steel.id, "1"))
            .await
            .unwrap();

        catalog.delete_routing(routing.id).await.unwrap();
        assert!(catalog.routing(routing.id).await.unwrap().is_none());
        let err = catalog.delete_routing(routing.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn audit_entries_are_newest_first() {
        use crate::audit::{AuditAction, record_action};

        let catalog = InMemoryCatalog::new();
        for record in 1..=3 {
            record_action(&catalog, NewAuditEntry::new(AuditAction::Create, "materials", record)).await;
        }

        let entries = catalog.audit_entries(None, 2).await.unwrap();
        let records: Vec<&str> = entries.iter().map(|e| e.record_id.as_str()).collect();
        assert_eq!(records, vec!["3", "2"]);
    }

    #[tokio::test]
    async fn audit_entries_filter_by_acting_user() {
        use crate::audit::{AuditAction, record_action};

        let catalog = InMemoryCatalog::new();
        let (admin, planner) = (UserId::new(1), UserId::new(2));
        for (record, actor) in [(1, admin), (2, planner), (3, admin)] {
            record_action(
                &catalog,
                NewAuditEntry::new(AuditAction::Update, "routings", record).by(actor),
            )
            .await;
        }

        let entries = catalog.audit_entries(Some(admin), 10).await.unwrap();
        let records: Vec<&str> = entries.iter().map(|e| e.record_id.as_str()).collect();
        assert_eq!(records, vec!["3", "1"]);
        assert!(catalog
            .audit_entries(Some(UserId::new(9)), 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn rejected_writes_do_not_consume_ids() {
        let catalog = InMemoryCatalog::new();
        let err = catalog
            .create_permission(NewPermission::named("plan view", "whitespace"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();
        let mut bad = routing_with(steel.id, "1");
        bad.operations[0].bom_items[0].base_qty = Decimal::ZERO;
        assert!(catalog.create_routing(bad).await.is_err());

        let permission = catalog
            .create_permission(NewPermission::named("plan:view", "View"))
            .await
            .unwrap();
        let routing = catalog
            .create_routing(routing_with(steel.id, "1"))
            .await
            .unwrap();
        assert_eq!(permission.id.get(), 1);
        assert_eq!(routing.id.get(), 1);
        assert_eq!(routing.operations[0].id.get(), 1);
    }

    #[tokio::test]
    async fn bom_values_beyond_stored_precision_are_rejected() {
        let catalog = InMemoryCatalog::new();
        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();

        let mut huge = routing_with(steel.id, "1");
        huge.operations[0].bom_items[0].quantity = dec!(50000000);
        let err = catalog.create_routing(huge).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let mut huge_base = routing_with(steel.id, "1");
        huge_base.operations[0].bom_items[0].base_qty = dec!(1000000);
        assert!(catalog.create_routing(huge_base).await.is_err());

        let mut huge_multiplier = routing_with(steel.id, "1");
        huge_multiplier.operations[0].bom_items[0].multiplier = dec!(2500000);
        assert!(catalog.create_routing(huge_multiplier).await.is_err());

        // Rounds up to the bound at stored precision.
        let mut rounds_over = routing_with(steel.id, "1");
        rounds_over.operations[0].bom_items[0].quantity = dec!(999999.9999996);
        assert!(catalog.create_routing(rounds_over).await.is_err());

        let mut at_max = routing_with(steel.id, "1");
        at_max.operations[0].bom_items[0].quantity = dec!(999999.999999);
        let routing = catalog.create_routing(at_max).await.unwrap();
        assert_eq!(routing.operations[0].bom_items[0].quantity, dec!(999999.999999));
    }

    #[tokio::test]
    async fn duplicate_alternate_material_conflicts() {
        use mfgplan_process::AlternateMaterial;

        let catalog = InMemoryCatalog::new();
        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();
        let alloy = catalog.create_material(material("RM-ALLOY")).await.unwrap();

        let mut draft = routing_with(steel.id, "1");
        draft.operations[0].bom_items[0].alternates = vec![
            AlternateMaterial { material_id: alloy.id, priority: 1 },
            AlternateMaterial { material_id: alloy.id, priority: 2 },
        ];
        let err = catalog.create_routing(draft).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert!(catalog.routings().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_user_changes_only_given_fields() {
        let catalog = InMemoryCatalog::new();
        let user = catalog
            .create_user(NewUser {
                username: "planner1".to_string(),
                full_name: Some("Plant Planner".to_string()),
                email: None,
                is_active: true,
                grants: vec![],
            })
            .await
            .unwrap();

        let updated = catalog
            .update_user(
                user.id,
                UserUpdate {
                    email: Some("planner1@example.com".to_string()),
                    is_active: Some(false),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Plant Planner"));
        assert_eq!(updated.email.as_deref(), Some("planner1@example.com"));
        assert!(!updated.is_active);
        assert_eq!(catalog.user(user.id).await.unwrap(), Some(updated));

        let err = catalog
            .update_user(UserId::new(77), UserUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }

    #[tokio::test]
    async fn update_routing_replaces_operations_with_fresh_ids() {
        let catalog = InMemoryCatalog::new();
        let steel = catalog.create_material(material("RM-STEEL")).await.unwrap();
        let first = catalog
            .create_routing(routing_with(steel.id, "1"))
            .await
            .unwrap();
        catalog
            .create_routing(routing_with(steel.id, "2"))
            .await
            .unwrap();

        let header_only = catalog
            .update_routing(
                first.id,
                RoutingUpdate {
                    status: Some(mfgplan_process::RoutingStatus::Active),
                    ..RoutingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(header_only.operations, first.operations);

        let replacement = routing_with(steel.id, "1").operations;
        let replaced = catalog
            .update_routing(
                first.id,
                RoutingUpdate {
                    operations: Some(replacement),
                    ..RoutingUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(replaced.operations[0].id.get(), 3);
        assert_eq!(replaced.operations[0].bom_items[0].id.get(), 3);

        let err = catalog
            .update_routing(
                first.id,
                RoutingUpdate {
                    version: Some("2".to_string()),
                    ..RoutingUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = catalog
            .update_routing(
                first.id,
                RoutingUpdate {
                    operations: Some(routing_with(MaterialId::new(40), "1").operations),
                    ..RoutingUpdate::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(catalog.routing(first.id).await.unwrap(), Some(replaced));
    }
}
