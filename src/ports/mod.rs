//! Ports - interfaces between the application core and the outside world.
//!
//! # Write side
//!
//! - `PurchaseRepository` - the entitlement record store
//! - `WebhookEventRepository` - webhook delivery ledger
//! - `EventPublisher` - notification transport
//!
//! # Read side / outbound
//!
//! - `PlanCatalog` - features and plans
//! - `GatewayClient` - follow-up calls to payment providers

mod event_publisher;
mod gateway_client;
mod plan_catalog;
mod purchase_repository;
mod webhook_event_repository;

pub use event_publisher::EventPublisher;
pub use gateway_client::GatewayClient;
pub use plan_catalog::PlanCatalog;
pub use purchase_repository::PurchaseRepository;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, RETRYABLE_OUTCOMES,
};
