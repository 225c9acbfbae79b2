//! In-memory adapters.
//!
//! Same contracts and unique constraints as the PostgreSQL adapters; used
//! by tests and by local runs without a database.

mod plan_catalog;
mod purchase_repository;
mod webhook_event_repository;

pub use plan_catalog::InMemoryPlanCatalog;
pub use purchase_repository::InMemoryPurchaseRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
