//! Storage seam for the planning catalog.
//!
//! Everything the API reads or writes goes through [`Catalog`]. Two
//! implementations exist: [`InMemoryCatalog`](crate::memory::InMemoryCatalog)
//! for dev/tests and `PgCatalog` (feature `postgres`) for persistence. Both
//! enforce the same uniqueness and referential rules.

pub mod drafts;

use async_trait::async_trait;

use mfgplan_auth::{EffectivePermissions, Permission, Role, RoleGrant, User};
use mfgplan_core::{DomainResult, PermissionId, RoleId, RoutingId, UserId};
use mfgplan_menus::Menu;
use mfgplan_process::{Material, Routing};

use crate::audit::{AuditEntry, NewAuditEntry};

pub use drafts::{
    NewBomItem, NewMaterial, NewMenu, NewOperation, NewPermission, NewRole, NewRouting, NewUser,
    RoutingUpdate, UserUpdate,
};

#[async_trait]
pub trait Catalog: Send + Sync {
    // ── access control ──────────────────────────────────────────────────────

    async fn permissions(&self) -> DomainResult<Vec<Permission>>;
    async fn create_permission(&self, draft: NewPermission) -> DomainResult<Permission>;

    async fn roles(&self) -> DomainResult<Vec<Role>>;
    async fn role(&self, role_id: RoleId) -> DomainResult<Option<Role>> {
        Ok(self.roles().await?.into_iter().find(|r| r.id == role_id))
    }
    async fn create_role(&self, draft: NewRole) -> DomainResult<Role>;
    /// Replace a role's permission set (empty clears it).
    async fn set_role_permissions(
        &self,
        role_id: RoleId,
        permission_ids: Vec<PermissionId>,
    ) -> DomainResult<Role>;

    async fn users(&self) -> DomainResult<Vec<User>>;
    async fn user(&self, user_id: UserId) -> DomainResult<Option<User>>;
    async fn create_user(&self, draft: NewUser) -> DomainResult<User>;
    /// Apply a partial profile update (name, email, active flag).
    async fn update_user(&self, user_id: UserId, update: UserUpdate) -> DomainResult<User>;
    /// Replace a user's scoped role grants (empty clears them).
    async fn set_user_grants(&self, user_id: UserId, grants: Vec<RoleGrant>) -> DomainResult<User>;

    async fn menus(&self) -> DomainResult<Vec<Menu>>;
    async fn create_menu(&self, draft: NewMenu) -> DomainResult<Menu>;

    // ── process data ────────────────────────────────────────────────────────

    async fn materials(&self) -> DomainResult<Vec<Material>>;
    async fn create_material(&self, draft: NewMaterial) -> DomainResult<Material>;

    async fn routings(&self) -> DomainResult<Vec<Routing>>;
    async fn routing(&self, routing_id: RoutingId) -> DomainResult<Option<Routing>>;
    /// Create a routing with its operations and BOM items in one step.
    async fn create_routing(&self, draft: NewRouting) -> DomainResult<Routing>;
    /// Apply a partial update; replacement operations get fresh identifiers.
    async fn update_routing(
        &self,
        routing_id: RoutingId,
        update: RoutingUpdate,
    ) -> DomainResult<Routing>;
    async fn delete_routing(&self, routing_id: RoutingId) -> DomainResult<()>;

    // ── audit ───────────────────────────────────────────────────────────────

    async fn append_audit(&self, entry: NewAuditEntry) -> DomainResult<AuditEntry>;
    /// Most recent entries first, at most `limit`, optionally only those
    /// recorded for one acting user.
    async fn audit_entries(
        &self,
        user_id: Option<UserId>,
        limit: usize,
    ) -> DomainResult<Vec<AuditEntry>>;

    // ── derived ─────────────────────────────────────────────────────────────

    /// Load a user and resolve their effective permissions in one go.
    async fn effective_permissions(
        &self,
        user_id: UserId,
    ) -> DomainResult<Option<(User, EffectivePermissions)>> {
        let Some(user) = self.user(user_id).await? else {
            return Ok(None);
        };
        let roles = self.roles().await?;
        let permissions = self.permissions().await?;
        let effective = EffectivePermissions::resolve(&user, &roles, &permissions);
        Ok(Some((user, effective)))
    }
}
