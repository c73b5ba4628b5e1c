//! Strongly-typed identifiers used across the domain.
//!
//! Records are keyed by database-assigned integers, so every identifier is an
//! `i64` newtype. Mixing a `MenuId` with a `PermissionId` is a compile error.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

macro_rules! int_id {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $t(i64);

        impl $t {
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|e| DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                if raw <= 0 {
                    return Err(DomainError::invalid_id(format!("{}: must be positive", $name)));
                }
                Ok(Self(raw))
            }
        }
    };
}

int_id!(
    /// Identifier of an atomic capability (e.g. `plan:view`).
    PermissionId,
    "PermissionId"
);
int_id!(
    /// Identifier of a named permission bundle.
    RoleId,
    "RoleId"
);
int_id!(
    /// Identifier of a user account.
    UserId,
    "UserId"
);
int_id!(
    /// Identifier of a menu node.
    MenuId,
    "MenuId"
);
int_id!(MaterialId, "MaterialId");
int_id!(RoutingId, "RoutingId");
int_id!(RoutingOperationId, "RoutingOperationId");
int_id!(BomItemId, "BomItemId");
int_id!(PlantId, "PlantId");
int_id!(BusinessUnitId, "BusinessUnitId");
int_id!(AuditLogId, "AuditLogId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_positive_integers() {
        let id: MenuId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn rejects_garbage_and_non_positive() {
        assert!(matches!("abc".parse::<RoleId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("0".parse::<RoleId>(), Err(DomainError::InvalidId(_))));
        assert!(matches!("-3".parse::<RoleId>(), Err(DomainError::InvalidId(_))));
    }

    #[test]
    fn serializes_transparently() {
        let json = serde_json::to_string(&PermissionId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: PermissionId = serde_json::from_str("7").unwrap();
        assert_eq!(back, PermissionId::new(7));
    }
}
