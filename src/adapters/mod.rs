//! Adapters - Implementations of port interfaces.
//!
//! - `memory` - in-memory stores for tests and local runs
//! - `postgres` - sqlx/PostgreSQL stores
//! - `events` - notification publishers
//! - `stripe`, `razorpay` - outbound provider API clients
//! - `http` - axum routes

pub mod events;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod razorpay;
pub mod stripe;

pub use events::{InMemoryEventBus, TracingEventPublisher};
pub use memory::{InMemoryPlanCatalog, InMemoryPurchaseRepository, InMemoryWebhookEventRepository};
