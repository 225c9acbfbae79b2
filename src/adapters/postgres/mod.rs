//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPurchaseRepository` - entitlement records
//! - `PostgresPlanCatalog` - features and plans
//! - `PostgresWebhookEventRepository` - webhook delivery ledger
//!
//! Schema lives in `migrations/`.

mod plan_catalog;
mod purchase_repository;
mod webhook_event_repository;

pub use plan_catalog::PostgresPlanCatalog;
pub use purchase_repository::PostgresPurchaseRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
