//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event plumbing and error types
//! that form the vocabulary of the entitlement domain.

mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use crate::domain_event;
pub use events::{DomainEvent, EventEnvelope, EventId, SerializableDomainEvent};
pub use ids::{FeatureKey, GatewayId, PlanId, PurchaseId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
