//! Postgres-backed catalog.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Code | DomainError |
//! |------------|-----------------|-------------|
//! | unique violation | `23505` | `Conflict` |
//! | foreign key violation | `23503` | `Validation` (unknown reference) |
//! | check violation | `23514` | `Validation` |
//! | numeric value out of range | `22003` | `Validation` |
//! | anything else | any | `Storage` |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::instrument;

use mfgplan_auth::{Permission, Role, RoleGrant, User, user::validate_grants};
use mfgplan_core::{
    AuditLogId, BomItemId, BusinessUnitId, DomainError, DomainResult, MaterialId, MenuId,
    PermissionId, PlantId, RoleId, RoutingId, RoutingOperationId, UserId,
};
use mfgplan_menus::Menu;
use mfgplan_process::{
    AlternateMaterial, BomItem, Material, MaterialType, Routing, RoutingOperation, RoutingStatus,
};

use crate::audit::{AuditAction, AuditEntry, NewAuditEntry};
use crate::catalog::{
    Catalog, NewMaterial, NewMenu, NewPermission, NewRole, NewRouting, NewUser, RoutingUpdate,
    UserUpdate,
};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

/// Catalog persisted in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> DomainResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Statements are idempotent.
    pub async fn migrate(&self) -> DomainResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn begin(&self, operation: &str) -> DomainResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error(operation, e))
    }

    async fn load_role_permissions(&self) -> DomainResult<HashMap<RoleId, Vec<PermissionId>>> {
        let rows = sqlx::query(
            "SELECT role_id, permission_id FROM role_permissions ORDER BY role_id, position",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_role_permissions", e))?;

        let mut by_role: HashMap<RoleId, Vec<PermissionId>> = HashMap::new();
        for row in rows {
            by_role
                .entry(RoleId::new(get(&row, "role_id")?))
                .or_default()
                .push(PermissionId::new(get(&row, "permission_id")?));
        }
        Ok(by_role)
    }

    async fn load_grants(&self, user_id: Option<UserId>) -> DomainResult<HashMap<UserId, Vec<RoleGrant>>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, role_id, plant_id, bu_id
            FROM user_roles
            WHERE $1::BIGINT IS NULL OR user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id.map(i64::from))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_grants", e))?;

        let mut by_user: HashMap<UserId, Vec<RoleGrant>> = HashMap::new();
        for row in rows {
            let plant_id: Option<i64> = get(&row, "plant_id")?;
            let bu_id: Option<i64> = get(&row, "bu_id")?;
            by_user
                .entry(UserId::new(get(&row, "user_id")?))
                .or_default()
                .push(RoleGrant {
                    role_id: RoleId::new(get(&row, "role_id")?),
                    plant_id: plant_id.map(PlantId::new),
                    business_unit_id: bu_id.map(BusinessUnitId::new),
                });
        }
        Ok(by_user)
    }

    /// Load routings (all, or one) with operations, BOM items and alternates.
    async fn load_routings(&self, routing_id: Option<RoutingId>) -> DomainResult<Vec<Routing>> {
        let filter = routing_id.map(i64::from);

        let routing_rows = sqlx::query(
            r#"
            SELECT id, product_part_num, plant_id, version, status, is_default
            FROM routings
            WHERE $1::BIGINT IS NULL OR id = $1
            ORDER BY id
            "#,
        )
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_routings", e))?;

        let op_rows = sqlx::query(
            r#"
            SELECT id, routing_id, step_num, name, semi_part_num
            FROM routing_operations
            WHERE $1::BIGINT IS NULL OR routing_id = $1
            ORDER BY routing_id, step_num
            "#,
        )
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_operations", e))?;

        let item_rows = sqlx::query(
            r#"
            SELECT b.id, b.routing_op_id, b.material_id, b.quantity, b.uom, b.base_qty,
                   b.base_uom, b.multiplier, b.scrap_pct, b.notes
            FROM bom_items b
            JOIN routing_operations o ON o.id = b.routing_op_id
            WHERE $1::BIGINT IS NULL OR o.routing_id = $1
            ORDER BY b.id
            "#,
        )
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_bom_items", e))?;

        let alt_rows = sqlx::query(
            r#"
            SELECT a.bom_item_id, a.material_id, a.priority
            FROM alternate_materials a
            JOIN bom_items b ON b.id = a.bom_item_id
            JOIN routing_operations o ON o.id = b.routing_op_id
            WHERE $1::BIGINT IS NULL OR o.routing_id = $1
            ORDER BY a.bom_item_id, a.priority, a.material_id
            "#,
        )
        .bind(filter)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_alternates", e))?;

        let mut alternates: HashMap<BomItemId, Vec<AlternateMaterial>> = HashMap::new();
        for row in alt_rows {
            alternates
                .entry(BomItemId::new(get(&row, "bom_item_id")?))
                .or_default()
                .push(AlternateMaterial {
                    material_id: MaterialId::new(get(&row, "material_id")?),
                    priority: get(&row, "priority")?,
                });
        }

        let mut items: HashMap<RoutingOperationId, Vec<BomItem>> = HashMap::new();
        for row in item_rows {
            let id = BomItemId::new(get(&row, "id")?);
            items
                .entry(RoutingOperationId::new(get(&row, "routing_op_id")?))
                .or_default()
                .push(BomItem {
                    id,
                    material_id: MaterialId::new(get(&row, "material_id")?),
                    quantity: get::<Decimal>(&row, "quantity")?.normalize(),
                    uom: get(&row, "uom")?,
                    base_qty: get::<Decimal>(&row, "base_qty")?.normalize(),
                    base_uom: get(&row, "base_uom")?,
                    multiplier: get::<Decimal>(&row, "multiplier")?.normalize(),
                    scrap_pct: get::<Decimal>(&row, "scrap_pct")?.normalize(),
                    alternates: alternates.remove(&id).unwrap_or_default(),
                    notes: get(&row, "notes")?,
                });
        }

        let mut operations: HashMap<RoutingId, Vec<RoutingOperation>> = HashMap::new();
        for row in op_rows {
            let id = RoutingOperationId::new(get(&row, "id")?);
            operations
                .entry(RoutingId::new(get(&row, "routing_id")?))
                .or_default()
                .push(RoutingOperation {
                    id,
                    step_num: get(&row, "step_num")?,
                    name: get(&row, "name")?,
                    semi_part_num: get(&row, "semi_part_num")?,
                    bom_items: items.remove(&id).unwrap_or_default(),
                });
        }

        routing_rows
            .into_iter()
            .map(|row| {
                let id = RoutingId::new(get(&row, "id")?);
                Ok(Routing {
                    id,
                    product_part_num: get(&row, "product_part_num")?,
                    plant_id: PlantId::new(get(&row, "plant_id")?),
                    version: get(&row, "version")?,
                    status: parse_status(&get::<String>(&row, "status")?)?,
                    is_default: get(&row, "is_default")?,
                    operations: operations.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    #[instrument(skip(self))]
    async fn permissions(&self) -> DomainResult<Vec<Permission>> {
        let rows = sqlx::query("SELECT id, name, description FROM permissions ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("permissions", e))?;
        rows.iter().map(permission_from_row).collect()
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn create_permission(&self, draft: NewPermission) -> DomainResult<Permission> {
        let mut permission = draft.into_permission(PermissionId::new(0))?;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO permissions (name, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(&permission.name)
        .bind(&permission.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_permission", e))?;
        permission.id = PermissionId::new(id);
        Ok(permission)
    }

    #[instrument(skip(self))]
    async fn roles(&self) -> DomainResult<Vec<Role>> {
        let rows = sqlx::query("SELECT id, name, description FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("roles", e))?;
        let mut permissions = self.load_role_permissions().await?;

        rows.iter()
            .map(|row| {
                let id = RoleId::new(get(row, "id")?);
                let mut role = Role::new(id, get::<String>(row, "name")?)
                    .with_permissions(permissions.remove(&id).unwrap_or_default());
                role.description = get(row, "description")?;
                Ok(role)
            })
            .collect()
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn create_role(&self, draft: NewRole) -> DomainResult<Role> {
        let mut role = draft.into_role(RoleId::new(0))?;
        let mut tx = self.begin("create_role").await?;

        let id: i64 =
            sqlx::query_scalar("INSERT INTO roles (name, description) VALUES ($1, $2) RETURNING id")
                .bind(&role.name)
                .bind(&role.description)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("create_role", e))?;
        role.id = RoleId::new(id);
        insert_role_permissions(&mut tx, role.id, &role.permission_ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_create_role", e))?;
        Ok(role)
    }

    #[instrument(skip(self, permission_ids))]
    async fn set_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: Vec<PermissionId>,
    ) -> DomainResult<Role> {
        let mut tx = self.begin("set_role_permissions").await?;

        let row = sqlx::query("SELECT id, name, description FROM roles WHERE id = $1 FOR UPDATE")
            .bind(role_id.get())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_role_permissions", e))?
            .ok_or_else(|| DomainError::not_found(format!("role {role_id}")))?;

        let mut role = Role::new(role_id, get::<String>(&row, "name")?).with_permissions(permission_ids);
        role.description = get(&row, "description")?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_role_permissions", e))?;
        insert_role_permissions(&mut tx, role.id, &role.permission_ids).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_set_role_permissions", e))?;
        Ok(role)
    }

    #[instrument(skip(self))]
    async fn users(&self) -> DomainResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, full_name, email, is_active FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("users", e))?;
        let mut grants = self.load_grants(None).await?;

        rows.iter()
            .map(|row| {
                let mut user = user_from_row(row)?;
                user.grants = grants.remove(&user.id).unwrap_or_default();
                Ok(user)
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn user(&self, user_id: UserId) -> DomainResult<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, full_name, email, is_active FROM users WHERE id = $1",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("user", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut user = user_from_row(&row)?;
        user.grants = self
            .load_grants(Some(user_id))
            .await?
            .remove(&user_id)
            .unwrap_or_default();
        Ok(Some(user))
    }

    #[instrument(skip(self, draft), fields(username = %draft.username))]
    async fn create_user(&self, draft: NewUser) -> DomainResult<User> {
        let mut user = draft.into_user(UserId::new(0))?;
        let mut tx = self.begin("create_user").await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO users (username, full_name, email, is_active)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.is_active)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        user.id = UserId::new(id);
        insert_grants(&mut tx, user.id, &user.grants).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_create_user", e))?;
        Ok(user)
    }

    #[instrument(skip(self, update))]
    async fn update_user(&self, user_id: UserId, update: UserUpdate) -> DomainResult<User> {
        let mut tx = self.begin("update_user").await?;

        let row = sqlx::query(
            "SELECT id, username, full_name, email, is_active FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?
        .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        let user = update.apply(user_from_row(&row)?)?;

        sqlx::query("UPDATE users SET full_name = $2, email = $3, is_active = $4 WHERE id = $1")
            .bind(user_id.get())
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(user.is_active)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("update_user", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_update_user", e))?;
        Ok(User {
            grants: self
                .load_grants(Some(user_id))
                .await?
                .remove(&user_id)
                .unwrap_or_default(),
            ..user
        })
    }

    #[instrument(skip(self, grants))]
    async fn set_user_grants(&self, user_id: UserId, grants: Vec<RoleGrant>) -> DomainResult<User> {
        validate_grants(&grants)?;
        let mut tx = self.begin("set_user_grants").await?;

        let row = sqlx::query(
            "SELECT id, username, full_name, email, is_active FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(user_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("set_user_grants", e))?
        .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
        let mut user = user_from_row(&row)?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id.get())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("clear_user_roles", e))?;
        insert_grants(&mut tx, user_id, &grants).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_set_user_grants", e))?;
        user.grants = grants;
        Ok(user)
    }

    #[instrument(skip(self))]
    async fn menus(&self) -> DomainResult<Vec<Menu>> {
        let rows = sqlx::query(
            r#"
            SELECT id, parent_id, name, route, icon, order_num, required_permission_id
            FROM menus
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("menus", e))?;

        rows.iter()
            .map(|row| {
                let parent_id: Option<i64> = get(row, "parent_id")?;
                let required: Option<i64> = get(row, "required_permission_id")?;
                Ok(Menu {
                    id: MenuId::new(get(row, "id")?),
                    parent_id: parent_id.map(MenuId::new),
                    name: get(row, "name")?,
                    route: get(row, "route")?,
                    icon: get(row, "icon")?,
                    order_num: get(row, "order_num")?,
                    required_permission_id: required.map(PermissionId::new),
                })
            })
            .collect()
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn create_menu(&self, draft: NewMenu) -> DomainResult<Menu> {
        let mut menu = draft.into_menu(MenuId::new(0))?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO menus (parent_id, name, route, icon, order_num, required_permission_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(menu.parent_id.map(i64::from))
        .bind(&menu.name)
        .bind(&menu.route)
        .bind(&menu.icon)
        .bind(menu.order_num)
        .bind(menu.required_permission_id.map(i64::from))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_menu", e))?;
        menu.id = MenuId::new(id);
        Ok(menu)
    }

    #[instrument(skip(self))]
    async fn materials(&self) -> DomainResult<Vec<Material>> {
        let rows = sqlx::query(
            "SELECT id, part_num, material_type, name, description, uom FROM materials ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("materials", e))?;

        rows.iter()
            .map(|row| {
                Ok(Material {
                    id: MaterialId::new(get(row, "id")?),
                    part_num: get(row, "part_num")?,
                    material_type: parse_material_type(&get::<String>(row, "material_type")?)?,
                    name: get(row, "name")?,
                    description: get(row, "description")?,
                    uom: get(row, "uom")?,
                })
            })
            .collect()
    }

    #[instrument(skip(self, draft), fields(part_num = %draft.part_num))]
    async fn create_material(&self, draft: NewMaterial) -> DomainResult<Material> {
        let mut material = draft.into_material(MaterialId::new(0))?;
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO materials (part_num, material_type, name, description, uom)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&material.part_num)
        .bind(material_type_str(material.material_type))
        .bind(&material.name)
        .bind(&material.description)
        .bind(&material.uom)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_material", e))?;
        material.id = MaterialId::new(id);
        Ok(material)
    }

    #[instrument(skip(self))]
    async fn routings(&self) -> DomainResult<Vec<Routing>> {
        self.load_routings(None).await
    }

    #[instrument(skip(self))]
    async fn routing(&self, routing_id: RoutingId) -> DomainResult<Option<Routing>> {
        Ok(self.load_routings(Some(routing_id)).await?.into_iter().next())
    }

    #[instrument(skip(self, draft), fields(product = %draft.product_part_num, version = %draft.version))]
    async fn create_routing(&self, draft: NewRouting) -> DomainResult<Routing> {
        let (mut op_seq, mut item_seq) = (0, 0);
        let mut routing = draft.into_routing(
            RoutingId::new(0),
            || provisional(&mut op_seq, RoutingOperationId::new),
            || provisional(&mut item_seq, BomItemId::new),
        )?;
        let mut tx = self.begin("create_routing").await?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO routings (product_part_num, plant_id, version, status, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&routing.product_part_num)
        .bind(routing.plant_id.get())
        .bind(&routing.version)
        .bind(status_str(routing.status))
        .bind(routing.is_default)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("create_routing", e))?;
        routing.id = RoutingId::new(id);

        insert_operations(&mut tx, routing.id, &mut routing.operations).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_create_routing", e))?;
        Ok(routing)
    }

    #[instrument(skip(self, update))]
    async fn update_routing(
        &self,
        routing_id: RoutingId,
        update: RoutingUpdate,
    ) -> DomainResult<Routing> {
        let current = self
            .routing(routing_id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("routing {routing_id}")))?;
        let replaces_operations = update.operations.is_some();
        let (mut op_seq, mut item_seq) = (0, 0);
        let mut routing = update.apply(
            current,
            || provisional(&mut op_seq, RoutingOperationId::new),
            || provisional(&mut item_seq, BomItemId::new),
        )?;
        let mut tx = self.begin("update_routing").await?;

        let result = sqlx::query(
            "UPDATE routings SET version = $2, status = $3, is_default = $4 WHERE id = $1",
        )
        .bind(routing_id.get())
        .bind(&routing.version)
        .bind(status_str(routing.status))
        .bind(routing.is_default)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("update_routing", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("routing {routing_id}")));
        }

        if replaces_operations {
            sqlx::query("DELETE FROM routing_operations WHERE routing_id = $1")
                .bind(routing_id.get())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("clear_operations", e))?;
            insert_operations(&mut tx, routing_id, &mut routing.operations).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_update_routing", e))?;
        Ok(routing)
    }

    #[instrument(skip(self))]
    async fn delete_routing(&self, routing_id: RoutingId) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM routings WHERE id = $1")
            .bind(routing_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_routing", e))?;
        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("routing {routing_id}")));
        }
        Ok(())
    }

    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action_type, table_name, record_id, before, after)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, timestamp
            "#,
        )
        .bind(entry.user_id.map(i64::from))
        .bind(entry.action.as_str())
        .bind(&entry.table_name)
        .bind(&entry.record_id)
        .bind(&entry.before)
        .bind(&entry.after)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("append_audit", e))?;

        let id = AuditLogId::new(get(&row, "id")?);
        let timestamp: DateTime<Utc> = get(&row, "timestamp")?;
        Ok(entry.stamped(id, timestamp))
    }

    #[instrument(skip(self))]
    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> DomainResult<Vec<AuditEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, action_type, table_name, record_id, before, after, timestamp
            FROM audit_logs
            WHERE $1::BIGINT IS NULL OR user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id.map(i64::from))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("audit_entries", e))?;

        rows.iter()
            .map(|row| {
                let user_id: Option<i64> = get(row, "user_id")?;
                let action: String = get(row, "action_type")?;
                Ok(AuditEntry {
                    id: AuditLogId::new(get(row, "id")?),
                    user_id: user_id.map(UserId::new),
                    action: AuditAction::parse(&action).ok_or_else(|| {
                        DomainError::storage(format!("unknown audit action '{action}'"))
                    })?,
                    table_name: get(row, "table_name")?,
                    record_id: get(row, "record_id")?,
                    before: get(row, "before")?,
                    after: get(row, "after")?,
                    timestamp: get(row, "timestamp")?,
                })
            })
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn get<'r, T>(row: &'r PgRow, column: &str) -> DomainResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| DomainError::storage(format!("failed to read column {column}: {e}")))
}

fn permission_from_row(row: &PgRow) -> DomainResult<Permission> {
    Ok(Permission {
        id: PermissionId::new(get(row, "id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
    })
}

fn user_from_row(row: &PgRow) -> DomainResult<User> {
    let mut user = User::new(UserId::new(get(row, "id")?), get::<String>(row, "username")?);
    user.full_name = get(row, "full_name")?;
    user.email = get(row, "email")?;
    user.is_active = get(row, "is_active")?;
    Ok(user)
}

async fn insert_role_permissions(
    tx: &mut Transaction<'static, Postgres>,
    role_id: RoleId,
    permission_ids: &[PermissionId],
) -> DomainResult<()> {
    for (position, permission_id) in permission_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO role_permissions (role_id, permission_id, position) VALUES ($1, $2, $3)",
        )
        .bind(role_id.get())
        .bind(permission_id.get())
        .bind(position as i32)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_role_permission", e))?;
    }
    Ok(())
}

async fn insert_grants(
    tx: &mut Transaction<'static, Postgres>,
    user_id: UserId,
    grants: &[RoleGrant],
) -> DomainResult<()> {
    for grant in grants {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id, plant_id, bu_id) VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id.get())
        .bind(grant.role_id.get())
        .bind(grant.plant_id.map(i64::from))
        .bind(grant.business_unit_id.map(i64::from))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user_role", e))?;
    }
    Ok(())
}

/// Next provisional id. Validation only needs them distinct; inserts assign
/// the real ones.
fn provisional<T>(seq: &mut i64, wrap: fn(i64) -> T) -> T {
    *seq -= 1;
    wrap(*seq)
}

async fn insert_operations(
    tx: &mut Transaction<'static, Postgres>,
    routing_id: RoutingId,
    operations: &mut [RoutingOperation],
) -> DomainResult<()> {
    for op in operations.iter_mut() {
        let op_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO routing_operations (routing_id, step_num, name, semi_part_num)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(routing_id.get())
        .bind(op.step_num)
        .bind(&op.name)
        .bind(&op.semi_part_num)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("create_operation", e))?;
        op.id = RoutingOperationId::new(op_id);

        for item in &mut op.bom_items {
            let item_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO bom_items
                    (routing_op_id, material_id, quantity, uom, base_qty, base_uom,
                     multiplier, scrap_pct, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                RETURNING id
                "#,
            )
            .bind(op_id)
            .bind(item.material_id.get())
            .bind(item.quantity)
            .bind(&item.uom)
            .bind(item.base_qty)
            .bind(&item.base_uom)
            .bind(item.multiplier)
            .bind(item.scrap_pct)
            .bind(&item.notes)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("create_bom_item", e))?;
            item.id = BomItemId::new(item_id);

            for alternate in &item.alternates {
                sqlx::query(
                    "INSERT INTO alternate_materials (bom_item_id, material_id, priority) VALUES ($1, $2, $3)",
                )
                .bind(item_id)
                .bind(alternate.material_id.get())
                .bind(alternate.priority)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("create_alternate", e))?;
            }
        }
    }
    Ok(())
}

fn material_type_str(material_type: MaterialType) -> &'static str {
    match material_type {
        MaterialType::Raw => "RAW",
        MaterialType::Semi => "SEMI",
        MaterialType::Finished => "FINISHED",
    }
}

fn parse_material_type(s: &str) -> DomainResult<MaterialType> {
    match s {
        "RAW" => Ok(MaterialType::Raw),
        "SEMI" => Ok(MaterialType::Semi),
        "FINISHED" => Ok(MaterialType::Finished),
        other => Err(DomainError::storage(format!("unknown material type '{other}'"))),
    }
}

fn status_str(status: RoutingStatus) -> &'static str {
    match status {
        RoutingStatus::Planning => "PLANNING",
        RoutingStatus::Active => "ACTIVE",
        RoutingStatus::Inactive => "INACTIVE",
    }
}

fn parse_status(s: &str) -> DomainResult<RoutingStatus> {
    match s {
        "PLANNING" => Ok(RoutingStatus::Planning),
        "ACTIVE" => Ok(RoutingStatus::Active),
        "INACTIVE" => Ok(RoutingStatus::Inactive),
        other => Err(DomainError::storage(format!("unknown routing status '{other}'"))),
    }
}

/// Map SQLx errors to DomainError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> DomainError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => DomainError::conflict(msg),
                Some("23503") => DomainError::validation(format!("unknown reference in {msg}")),
                Some("23514") | Some("22003") => DomainError::validation(msg),
                _ => DomainError::storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            DomainError::storage(format!("connection pool closed in {}", operation))
        }
        _ => DomainError::storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
