//! Demo data: the standard permission set, roles, navigation and a sample
//! routing.

use std::collections::HashMap;

use rust_decimal::Decimal;

use mfgplan_auth::RoleGrant;
use mfgplan_auth::permissions::{
    ADMIN_ALL, PLAN_EDIT, PLAN_VIEW, ROUTING_EDIT, ROUTING_VIEW, USER_MANAGE,
};
use mfgplan_core::{DomainError, DomainResult, MenuId, PermissionId, PlantId, RoleId};
use mfgplan_process::{AlternateMaterial, MaterialType, RoutingStatus};

use crate::catalog::{
    Catalog, NewBomItem, NewMaterial, NewMenu, NewOperation, NewPermission, NewRole, NewRouting,
    NewUser,
};

const PERMISSIONS: &[(&str, &str)] = &[
    (ADMIN_ALL, "Full system access"),
    (USER_MANAGE, "Manage users and roles"),
    (PLAN_VIEW, "View capacity plans"),
    (PLAN_EDIT, "Edit capacity plans"),
    (ROUTING_VIEW, "View routings and BOMs"),
    (ROUTING_EDIT, "Edit routings and BOMs"),
];

const ROLES: &[(&str, &str, &[&str])] = &[
    ("Administrator", "System administrator", &[ADMIN_ALL, USER_MANAGE]),
    ("Planner", "Production planner", &[PLAN_VIEW, PLAN_EDIT, ROUTING_VIEW]),
    ("Viewer", "Read-only access", &[PLAN_VIEW, ROUTING_VIEW]),
];

struct MenuSeed {
    key: &'static str,
    parent: Option<&'static str>,
    name: &'static str,
    route: &'static str,
    icon: &'static str,
    order_num: i32,
    permission: Option<&'static str>,
}

const MENUS: &[MenuSeed] = &[
    MenuSeed { key: "dashboard", parent: None, name: "Dashboard", route: "/dashboard", icon: "bi-grid", order_num: 1, permission: None },
    MenuSeed { key: "planning", parent: None, name: "Capacity Planning", route: "/planning", icon: "bi-bar-chart-line", order_num: 10, permission: Some(PLAN_VIEW) },
    MenuSeed { key: "mfg", parent: None, name: "Manufacturing Data", route: "/mfg-data", icon: "bi-box-seam", order_num: 20, permission: None },
    MenuSeed { key: "routings", parent: Some("mfg"), name: "Routings", route: "/routings", icon: "bi-diagram-3", order_num: 21, permission: Some(ROUTING_VIEW) },
    MenuSeed { key: "admin", parent: None, name: "System Admin", route: "/admin", icon: "bi-gear", order_num: 100, permission: Some(USER_MANAGE) },
    MenuSeed { key: "users", parent: Some("admin"), name: "User Management", route: "/admin/users", icon: "bi-people", order_num: 101, permission: Some(USER_MANAGE) },
    MenuSeed { key: "roles", parent: Some("admin"), name: "Role Management", route: "/admin/roles", icon: "bi-person-badge", order_num: 102, permission: Some(USER_MANAGE) },
];

/// What `seed_demo` created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions: usize,
    pub roles: usize,
    pub menus: usize,
    pub users: usize,
    pub materials: usize,
    pub routings: usize,
}

/// Populate an empty catalog with demo data.
///
/// Returns `None` without touching anything when permissions already exist.
pub async fn seed_demo(catalog: &dyn Catalog) -> DomainResult<Option<SeedReport>> {
    if !catalog.permissions().await?.is_empty() {
        tracing::info!("catalog already populated; skipping demo seed");
        return Ok(None);
    }

    let mut report = SeedReport::default();

    let mut permission_ids: HashMap<&str, PermissionId> = HashMap::new();
    for (name, description) in PERMISSIONS {
        let permission = catalog
            .create_permission(NewPermission::named(*name, *description))
            .await?;
        permission_ids.insert(*name, permission.id);
        report.permissions += 1;
    }
    let permission = |name: &str| {
        permission_ids
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("permission {name}")))
    };

    let mut role_ids: HashMap<&str, RoleId> = HashMap::new();
    for (name, description, grants) in ROLES {
        let granted = grants
            .iter()
            .map(|p| permission(*p))
            .collect::<DomainResult<Vec<_>>>()?;
        let role = catalog
            .create_role(NewRole {
                name: name.to_string(),
                description: Some(description.to_string()),
                permission_ids: granted,
            })
            .await?;
        role_ids.insert(*name, role.id);
        report.roles += 1;
    }
    let role = |name: &str| {
        role_ids
            .get(name)
            .copied()
            .ok_or_else(|| DomainError::not_found(format!("role {name}")))
    };

    let mut menu_ids: HashMap<&str, MenuId> = HashMap::new();
    for seed in MENUS {
        let parent_id = match seed.parent {
            Some(key) => Some(
                menu_ids
                    .get(key)
                    .copied()
                    .ok_or_else(|| DomainError::not_found(format!("menu {key}")))?,
            ),
            None => None,
        };
        let required_permission_id = seed.permission.map(|p| permission(p)).transpose()?;
        let menu = catalog
            .create_menu(NewMenu {
                parent_id,
                name: seed.name.to_string(),
                route: Some(seed.route.to_string()),
                icon: Some(seed.icon.to_string()),
                order_num: seed.order_num,
                required_permission_id,
            })
            .await?;
        menu_ids.insert(seed.key, menu.id);
        report.menus += 1;
    }

    for (username, full_name, role_name) in [
        ("admin", "System Administrator", "Administrator"),
        ("planner1", "Production Planner", "Planner"),
    ] {
        catalog
            .create_user(NewUser {
                username: username.to_string(),
                full_name: Some(full_name.to_string()),
                email: Some(format!("{username}@example.com")),
                is_active: true,
                grants: vec![RoleGrant::unscoped(role(role_name)?)],
            })
            .await?;
        report.users += 1;
    }

    let mut material_ids = Vec::new();
    for (part_num, material_type, name, uom) in [
        ("RM-STEEL-01", MaterialType::Raw, "Steel sheet", "kg"),
        ("RM-STEEL-02", MaterialType::Raw, "Steel sheet (alt. supplier)", "kg"),
        ("RM-PAINT-01", MaterialType::Raw, "Primer paint", "l"),
        ("SF-FRAME-01", MaterialType::Semi, "Welded frame", "pcs"),
        ("FG-CABINET-01", MaterialType::Finished, "Steel cabinet", "pcs"),
    ] {
        let material = catalog
            .create_material(NewMaterial {
                part_num: part_num.to_string(),
                material_type,
                name: Some(name.to_string()),
                description: None,
                uom: uom.to_string(),
            })
            .await?;
        material_ids.push(material.id);
        report.materials += 1;
    }

    catalog
        .create_routing(NewRouting {
            product_part_num: "FG-CABINET-01".to_string(),
            plant_id: PlantId::new(1),
            version: "1".to_string(),
            status: RoutingStatus::Active,
            is_default: true,
            operations: vec![
                NewOperation {
                    step_num: 10,
                    name: "Cut and weld".to_string(),
                    semi_part_num: Some("SF-FRAME-01".to_string()),
                    bom_items: vec![NewBomItem {
                        material_id: material_ids[0],
                        quantity: Decimal::new(125, 1),
                        uom: "kg".to_string(),
                        base_qty: Decimal::ONE,
                        base_uom: "pcs".to_string(),
                        multiplier: Decimal::ONE,
                        scrap_pct: Decimal::new(8, 2),
                        alternates: vec![AlternateMaterial {
                            material_id: material_ids[1],
                            priority: 1,
                        }],
                        notes: None,
                    }],
                },
                NewOperation {
                    step_num: 20,
                    name: "Paint".to_string(),
                    semi_part_num: None,
                    bom_items: vec![NewBomItem {
                        material_id: material_ids[2],
                        quantity: Decimal::new(3, 0),
                        uom: "l".to_string(),
                        base_qty: Decimal::new(10, 0),
                        base_uom: "pcs".to_string(),
                        multiplier: Decimal::ONE,
                        scrap_pct: Decimal::ZERO,
                        alternates: vec![],
                        notes: Some("3 l per 10 cabinets".to_string()),
                    }],
                },
            ],
        })
        .await?;
    report.routings += 1;

    tracing::info!(?report, "seeded demo catalog");
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryCatalog;
    use mfgplan_menus::build_menu_tree;

    #[tokio::test]
    async fn seeds_once() {
        let catalog = InMemoryCatalog::new();
        let report = seed_demo(&catalog).await.unwrap().unwrap();
        assert_eq!(report.permissions, 6);
        assert_eq!(report.roles, 3);
        assert_eq!(report.menus, 7);
        assert_eq!(report.users, 2);

        assert!(seed_demo(&catalog).await.unwrap().is_none());
        assert_eq!(catalog.permissions().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn planner_sees_planning_and_routings_only() {
        let catalog = InMemoryCatalog::new();
        seed_demo(&catalog).await.unwrap();

        let planner = catalog
            .users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.username == "planner1")
            .unwrap();
        let (_, effective) = catalog
            .effective_permissions(planner.id)
            .await
            .unwrap()
            .unwrap();
        let menus = catalog.menus().await.unwrap();
        let tree = build_menu_tree(&menus, effective.permission_ids(), effective.is_admin());

        let names: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Dashboard", "Capacity Planning", "Manufacturing Data"]);
        assert_eq!(tree[2].children[0].name, "Routings");
    }

    #[tokio::test]
    async fn admin_sees_everything() {
        let catalog = InMemoryCatalog::new();
        seed_demo(&catalog).await.unwrap();

        let admin = catalog
            .users()
            .await
            .unwrap()
            .into_iter()
            .find(|u| u.username == "admin")
            .unwrap();
        let (_, effective) = catalog
            .effective_permissions(admin.id)
            .await
            .unwrap()
            .unwrap();
        assert!(effective.is_admin());

        let menus = catalog.menus().await.unwrap();
        let tree = build_menu_tree(&menus, effective.permission_ids(), effective.is_admin());
        assert_eq!(tree.len(), 4);
        assert_eq!(tree[3].children.len(), 2);
    }
}
