//! HTTP surface — thin axum routes over the pipeline and registry.

pub mod routes;
pub mod types;

pub use routes::onboard_routes;
