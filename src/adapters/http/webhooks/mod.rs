//! HTTP adapter for payment provider callbacks.

mod handlers;
mod routes;

pub use handlers::WebhookAck;
pub use routes::webhook_routes;
