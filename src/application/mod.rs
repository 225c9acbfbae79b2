//! Application layer - lifecycle orchestration and webhook reconciliation.
//!
//! Coordinates domain operations across ports. `LifecycleManager` is the
//! only writer of entitlement records; reconcilers and the HTTP layer go
//! through it.

pub mod credentials;
pub mod lifecycle;
pub mod reconciler;

pub use credentials::{
    CredentialGenerator, CredentialManager, RandomCredentialGenerator, DEFAULT_MAX_ATTEMPTS,
};
pub use lifecycle::{
    ActivatePurchaseCommand, ActivationResult, FailureResult, InitiatePurchaseCommand,
    LifecycleManager, RecordFailureCommand, TerminatePurchaseCommand, TerminationResult,
};
pub use reconciler::{
    GatewayReconciler, RazorpayReconciler, ReconcileOutcome, ReconcilerRegistry,
    ReconciliationService, StripeReconciler,
};
