use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use mfgplan_auth::EffectivePermissions;
use mfgplan_core::{DomainError, DomainResult, Entity, MenuId, PermissionId};

/// A node of the menu forest, as stored (flat, parent-linked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Menu {
    pub id: MenuId,
    pub parent_id: Option<MenuId>,
    pub name: String,
    pub route: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub order_num: i32,
    /// `None` means the node is visible to everyone.
    pub required_permission_id: Option<PermissionId>,
}

impl Menu {
    pub fn new(id: MenuId, name: impl Into<String>) -> Self {
        Self {
            id,
            parent_id: None,
            name: name.into(),
            route: None,
            icon: None,
            order_num: 0,
            required_permission_id: None,
        }
    }

    pub fn under(mut self, parent_id: MenuId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn ordered(mut self, order_num: i32) -> Self {
        self.order_num = order_num;
        self
    }

    pub fn gated_by(mut self, permission_id: PermissionId) -> Self {
        self.required_permission_id = Some(permission_id);
        self
    }

    pub fn routed(mut self, route: impl Into<String>, icon: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self.icon = Some(icon.into());
        self
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::validation("menu name cannot be empty"));
        }
        if self.parent_id == Some(self.id) {
            return Err(DomainError::validation("menu cannot be its own parent"));
        }
        Ok(())
    }
}

impl Entity for Menu {
    type Id = MenuId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// A visible menu node with its visible children, in sibling order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuNode {
    pub id: MenuId,
    pub parent_id: Option<MenuId>,
    pub name: String,
    pub route: Option<String>,
    pub icon: Option<String>,
    pub order_num: i32,
    pub required_permission_id: Option<PermissionId>,
    pub children: Vec<MenuNode>,
}

impl MenuNode {
    pub(crate) fn leaf(menu: &Menu) -> Self {
        Self {
            id: menu.id,
            parent_id: menu.parent_id,
            name: menu.name.clone(),
            route: menu.route.clone(),
            icon: menu.icon.clone(),
            order_num: menu.order_num,
            required_permission_id: menu.required_permission_id,
            children: Vec::new(),
        }
    }
}

/// Per-node visibility rule for one user.
#[derive(Debug, Clone, Default)]
pub struct MenuAccess {
    permission_ids: HashSet<PermissionId>,
    is_admin: bool,
}

impl MenuAccess {
    pub fn new(permission_ids: HashSet<PermissionId>, is_admin: bool) -> Self {
        Self {
            permission_ids,
            is_admin,
        }
    }

    pub fn for_user(effective: &EffectivePermissions) -> Self {
        Self::new(effective.permission_ids().clone(), effective.is_admin())
    }

    /// Visible iff admin, ungated, or gated by a held permission.
    pub fn can_access(&self, menu: &Menu) -> bool {
        if self.is_admin {
            return true;
        }
        match menu.required_permission_id {
            None => true,
            Some(required) => self.permission_ids.contains(&required),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_rule() {
        let gated = Menu::new(MenuId::new(1), "Plan").gated_by(PermissionId::new(7));
        let open = Menu::new(MenuId::new(2), "Dashboard");

        let nobody = MenuAccess::default();
        assert!(nobody.can_access(&open));
        assert!(!nobody.can_access(&gated));

        let holder = MenuAccess::new(HashSet::from([PermissionId::new(7)]), false);
        assert!(holder.can_access(&gated));

        let admin = MenuAccess::new(HashSet::new(), true);
        assert!(admin.can_access(&gated));
    }

    #[test]
    fn self_parent_is_invalid() {
        let menu = Menu::new(MenuId::new(3), "Loop").under(MenuId::new(3));
        assert!(menu.validate().is_err());
    }
}
