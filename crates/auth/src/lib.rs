//! `mfgplan-auth`: pure authentication/authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP and storage: callers hand
//! in already-loaded users, roles and permissions and get back decisions.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, EffectivePermissions, authorize};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::{ADMIN_ALL, Permission};
pub use roles::Role;
pub use user::{RoleGrant, User};
