//! Infrastructure layer: catalog storage (in-memory and Postgres), audit
//! trail, and demo data.

pub mod audit;
pub mod catalog;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod seed;
pub mod store;

pub use audit::{AuditAction, AuditEntry, NewAuditEntry, record_action};
pub use catalog::Catalog;
pub use memory::InMemoryCatalog;
#[cfg(feature = "postgres")]
pub use postgres::PgCatalog;
pub use seed::{SeedReport, seed_demo};
