use serde::{Deserialize, Serialize};

use mfgplan_core::{DomainError, DomainResult, Entity, PermissionId, RoleId};

/// Named bundle of permissions (many-to-many with `Permission`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub permission_ids: Vec<PermissionId>,
}

impl Role {
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            permission_ids: Vec::new(),
        }
    }

    pub fn with_permissions(mut self, ids: impl IntoIterator<Item = PermissionId>) -> Self {
        self.set_permissions(ids);
        self
    }

    /// Replace the permission set. Duplicates collapse; order follows first
    /// occurrence.
    pub fn set_permissions(&mut self, ids: impl IntoIterator<Item = PermissionId>) {
        self.permission_ids.clear();
        for id in ids {
            if !self.permission_ids.contains(&id) {
                self.permission_ids.push(id);
            }
        }
    }

    pub fn holds(&self, permission_id: PermissionId) -> bool {
        self.permission_ids.contains(&permission_id)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("role name cannot be empty"));
        }
        Ok(())
    }
}

impl Entity for Role {
    type Id = RoleId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_permissions_dedups_in_first_seen_order() {
        let role = Role::new(RoleId::new(1), "Planner").with_permissions([
            PermissionId::new(3),
            PermissionId::new(1),
            PermissionId::new(3),
        ]);
        assert_eq!(role.permission_ids, vec![PermissionId::new(3), PermissionId::new(1)]);
        assert!(role.holds(PermissionId::new(1)));
        assert!(!role.holds(PermissionId::new(2)));
    }

    #[test]
    fn blank_name_is_rejected() {
        assert!(Role::new(RoleId::new(1), " ").validate().is_err());
    }
}
