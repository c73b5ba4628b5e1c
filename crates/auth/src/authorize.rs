use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;

use mfgplan_core::{PermissionId, RoleId};

use crate::{ADMIN_ALL, Permission, Role, User};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// A user's effective permission set: the union across all held roles.
///
/// Construction is decoupled from storage: callers pass the user together with
/// whatever roles and permissions they loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectivePermissions {
    permission_ids: HashSet<PermissionId>,
    permission_names: BTreeSet<String>,
    is_admin: bool,
}

impl EffectivePermissions {
    /// No permissions at all (anonymous/inactive users).
    pub fn none() -> Self {
        Self::default()
    }

    /// Resolve a user's permissions from role and permission records.
    ///
    /// Grants pointing at unknown roles and role entries pointing at unknown
    /// permissions contribute nothing. Inactive users resolve to `none()`.
    pub fn resolve<'a>(
        user: &User,
        roles: impl IntoIterator<Item = &'a Role>,
        permissions: impl IntoIterator<Item = &'a Permission>,
    ) -> Self {
        if !user.is_active {
            return Self::none();
        }

        let roles: HashMap<RoleId, &Role> = roles.into_iter().map(|r| (r.id, r)).collect();
        let names: HashMap<PermissionId, &str> = permissions
            .into_iter()
            .map(|p| (p.id, p.name.as_str()))
            .collect();

        let mut effective = Self::none();
        for role_id in user.role_ids() {
            let Some(role) = roles.get(&role_id) else {
                continue;
            };
            for permission_id in &role.permission_ids {
                let Some(name) = names.get(permission_id) else {
                    continue;
                };
                effective.permission_ids.insert(*permission_id);
                effective.permission_names.insert((*name).to_string());
            }
        }
        effective.is_admin = effective.permission_names.contains(ADMIN_ALL);
        effective
    }

    pub fn permission_ids(&self) -> &HashSet<PermissionId> {
        &self.permission_ids
    }

    pub fn permission_names(&self) -> &BTreeSet<String> {
        &self.permission_names
    }

    /// True iff `admin:all` is among the effective permission names.
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    pub fn has(&self, name: &str) -> bool {
        self.is_admin || self.permission_names.contains(name)
    }
}

/// Check a named permission against a resolved permission set.
///
/// - No IO
/// - No panics
/// - `admin:all` passes every check
pub fn authorize(effective: &EffectivePermissions, required: &str) -> Result<(), AuthzError> {
    if effective.has(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.to_string()))
    }
}
