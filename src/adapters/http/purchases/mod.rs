//! HTTP adapter for the lifecycle manager: commands used by checkout
//! flows and operators, plus the entitlement read interface.

pub mod dto;
mod handlers;
mod routes;

pub use routes::purchase_routes;
