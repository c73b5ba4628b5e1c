use serde::{Deserialize, Serialize};

use mfgplan_core::{DomainError, DomainResult, Entity, PermissionId};

/// Wildcard permission: any role holding it passes every permission check.
pub const ADMIN_ALL: &str = "admin:all";

/// Manage users, roles, permissions and menus.
pub const USER_MANAGE: &str = "user:manage";
pub const PLAN_VIEW: &str = "plan:view";
pub const PLAN_EDIT: &str = "plan:edit";
pub const ROUTING_VIEW: &str = "routing:view";
pub const ROUTING_EDIT: &str = "routing:edit";

/// Atomic capability, identified by a unique name (e.g. `"plan:view"`).
///
/// Permissions are immutable once granted; the name is the stable handle used
/// by policy checks, the id is what menus and roles reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub id: PermissionId,
    pub name: String,
    pub description: Option<String>,
}

impl Permission {
    pub fn new(id: PermissionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_wildcard(&self) -> bool {
        self.name == ADMIN_ALL
    }
}

impl Entity for Permission {
    type Id = PermissionId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Permission names are `scope:action` tokens without whitespace.
pub fn validate_permission_name(name: &str) -> DomainResult<()> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("permission name cannot be empty"));
    }
    if name.chars().any(char::is_whitespace) {
        return Err(DomainError::validation("permission name cannot contain whitespace"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_all_is_wildcard() {
        assert!(Permission::new(PermissionId::new(1), ADMIN_ALL).is_wildcard());
        assert!(!Permission::new(PermissionId::new(2), "admin:allow").is_wildcard());
        assert!(!Permission::new(PermissionId::new(3), USER_MANAGE).is_wildcard());
    }

    #[test]
    fn names_must_be_single_tokens() {
        assert!(validate_permission_name("plan:view").is_ok());
        assert!(validate_permission_name("  ").is_err());
        assert!(validate_permission_name("plan view").is_err());
    }
}
