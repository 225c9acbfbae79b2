//! Purchase domain module.
//!
//! Entitlement records, their lifecycle states and the plans they are
//! bought under.
//!
//! # Module Structure
//!
//! - `record` - Purchase aggregate (one entitlement record)
//! - `status` - PurchaseStatus state machine
//! - `transaction_type` - Why a record was created
//! - `plan` - Plan, Feature, BillingCycle, CredentialKind
//! - `payment` - Gateway reference bundle
//! - `events` - Notifications
//! - `errors` - PurchaseError taxonomy

mod errors;
mod events;
mod payment;
mod plan;
mod record;
mod status;
mod transaction_type;

pub use errors::PurchaseError;
pub use events::{PlanCancelled, PlanSwitched, PurchaseActivated, PurchaseFailed, PurchaseInitiated};
pub use payment::PaymentDetails;
pub use plan::{BillingCycle, CredentialKind, Feature, Plan};
pub use record::Purchase;
pub use status::PurchaseStatus;
pub use transaction_type::TransactionType;
