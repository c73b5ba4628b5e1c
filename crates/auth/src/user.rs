//! User accounts and their scoped role grants.

use serde::{Deserialize, Serialize};

use mfgplan_core::{BusinessUnitId, DomainError, DomainResult, Entity, PlantId, RoleId, UserId};

// ─────────────────────────────────────────────────────────────────────────────
// Role grants
// ─────────────────────────────────────────────────────────────────────────────

/// A role held by a user, optionally scoped to a plant and/or business unit.
///
/// The scope is recorded and returned to clients; permission resolution does
/// not narrow by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleGrant {
    pub role_id: RoleId,
    #[serde(default)]
    pub plant_id: Option<PlantId>,
    #[serde(default)]
    pub business_unit_id: Option<BusinessUnitId>,
}

impl RoleGrant {
    pub fn unscoped(role_id: RoleId) -> Self {
        Self {
            role_id,
            plant_id: None,
            business_unit_id: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User
// ─────────────────────────────────────────────────────────────────────────────

/// User account.
///
/// # Invariants
/// - `username` is non-empty (uniqueness is a storage concern).
/// - No two grants share the same `(role, plant, business unit)` scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub is_active: bool,
    #[serde(default)]
    pub grants: Vec<RoleGrant>,
}

impl User {
    pub fn new(id: UserId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            full_name: None,
            email: None,
            is_active: true,
            grants: Vec::new(),
        }
    }

    pub fn with_grants(mut self, grants: impl IntoIterator<Item = RoleGrant>) -> Self {
        self.grants = grants.into_iter().collect();
        self
    }

    /// Distinct role ids across all grants, in grant order.
    pub fn role_ids(&self) -> Vec<RoleId> {
        let mut ids = Vec::with_capacity(self.grants.len());
        for grant in &self.grants {
            if !ids.contains(&grant.role_id) {
                ids.push(grant.role_id);
            }
        }
        ids
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.username.trim().is_empty() {
            return Err(DomainError::validation("username cannot be empty"));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(DomainError::validation("email must contain '@'"));
            }
        }
        validate_grants(&self.grants)
    }
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Reject duplicate `(role, plant, business unit)` grants.
pub fn validate_grants(grants: &[RoleGrant]) -> DomainResult<()> {
    for (i, grant) in grants.iter().enumerate() {
        if grants[..i].contains(grant) {
            return Err(DomainError::conflict(format!(
                "role {} is already granted for this scope",
                grant.role_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_role_in_different_scopes_is_allowed() {
        let user = User::new(UserId::new(1), "planner1").with_grants([
            RoleGrant::unscoped(RoleId::new(2)),
            RoleGrant {
                role_id: RoleId::new(2),
                plant_id: Some(PlantId::new(1)),
                business_unit_id: None,
            },
        ]);
        assert!(user.validate().is_ok());
        assert_eq!(user.role_ids(), vec![RoleId::new(2)]);
    }

    #[test]
    fn duplicate_scope_is_a_conflict() {
        let user = User::new(UserId::new(1), "planner1").with_grants([
            RoleGrant::unscoped(RoleId::new(2)),
            RoleGrant::unscoped(RoleId::new(2)),
        ]);
        assert!(matches!(user.validate(), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn blank_username_and_bad_email_are_rejected() {
        assert!(User::new(UserId::new(1), "").validate().is_err());

        let mut user = User::new(UserId::new(1), "x");
        user.email = Some("nope".into());
        assert!(user.validate().is_err());
    }
}
