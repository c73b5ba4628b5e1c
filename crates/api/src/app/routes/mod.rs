use axum::{Router, routing::get};

pub mod admin;
pub mod materials;
pub mod menus;
pub mod routings;
pub mod system;

/// Router for all authenticated endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/menus", get(menus::my_menus))
        .nest("/admin", admin::router())
        .nest("/materials", materials::router())
        .nest("/routings", routings::router())
}
