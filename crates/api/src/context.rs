use mfgplan_auth::{EffectivePermissions, User};
use mfgplan_core::UserId;

/// Authenticated identity for a request, taken from the bearer token.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UserContext {
    user_id: UserId,
}

impl UserContext {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }
}

/// The caller's user record together with the permissions it resolves to.
#[derive(Debug, Clone)]
pub struct Caller {
    pub user: User,
    pub permissions: EffectivePermissions,
}

impl Caller {
    pub fn user_id(&self) -> UserId {
        self.user.id
    }
}
