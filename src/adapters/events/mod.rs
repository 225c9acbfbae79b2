//! Event publishing adapters.
//!
//! - `InMemoryEventBus` - captures notifications for tests and local runs
//! - `TracingEventPublisher` - notifications as structured log lines

mod in_memory;
mod tracing_publisher;

pub use in_memory::InMemoryEventBus;
pub use tracing_publisher::{TracingEventPublisher, EVENT_LOG_TARGET};
