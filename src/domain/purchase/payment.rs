//! Gateway reference bundle attached to a confirmation.

use serde::{Deserialize, Serialize};

/// Whatever the payment gateway told us about a charge.
///
/// Every field is optional; providers populate different subsets and
/// redeliveries may carry more than the first delivery did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// Provider reference for the charge (payment intent, payment id, ...).
    pub transaction_ref: Option<String>,

    /// Amount in the smallest currency unit.
    pub amount_cents: Option<i64>,

    pub currency: Option<String>,
    pub gateway_subscription_id: Option<String>,
    pub gateway_customer_id: Option<String>,
    pub gateway_payment_method_id: Option<String>,
}

impl PaymentDetails {
    pub fn with_transaction_ref(mut self, reference: impl Into<String>) -> Self {
        self.transaction_ref = Some(reference.into());
        self
    }

    pub fn with_amount(mut self, amount_cents: i64, currency: impl Into<String>) -> Self {
        self.amount_cents = Some(amount_cents);
        self.currency = Some(currency.into());
        self
    }

    pub fn with_subscription(mut self, subscription_id: impl Into<String>) -> Self {
        self.gateway_subscription_id = Some(subscription_id.into());
        self
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.gateway_customer_id = Some(customer_id.into());
        self
    }

    pub fn with_payment_method(mut self, payment_method_id: impl Into<String>) -> Self {
        self.gateway_payment_method_id = Some(payment_method_id.into());
        self
    }
}
