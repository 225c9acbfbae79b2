//! Notification plumbing.
//!
//! Lifecycle notifications are plain structs; `domain_event!` wires them to
//! `DomainEvent`, and `to_envelope()` wraps them for an `EventPublisher`.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use uuid::Uuid;

use super::Timestamp;

/// A notification about one entitlement record.
pub trait DomainEvent: Send + Sync {
    /// Versioned name, e.g. "purchase.activated.v1".
    fn event_type(&self) -> &'static str;

    /// Id of the record the notification is about.
    fn aggregate_id(&self) -> String;

    fn aggregate_type(&self) -> &'static str;

    /// Owner of the record.
    fn user_id(&self) -> String;

    fn occurred_at(&self) -> Timestamp;

    fn event_id(&self) -> EventId;
}

/// Adds `to_envelope()` to every serializable notification.
pub trait SerializableDomainEvent: DomainEvent + Serialize {
    fn to_envelope(&self) -> EventEnvelope {
        let event_type = self.event_type().to_string();
        EventEnvelope {
            event_id: self.event_id(),
            schema_version: EventEnvelope::extract_version(&event_type),
            event_type,
            aggregate_id: self.aggregate_id(),
            aggregate_type: self.aggregate_type().to_string(),
            user_id: self.user_id(),
            occurred_at: self.occurred_at(),
            payload: serde_json::to_value(self).unwrap_or(JsonValue::Null),
        }
    }
}

impl<T: DomainEvent + Serialize> SerializableDomainEvent for T {}

/// Implements `DomainEvent` from named fields.
///
/// ```ignore
/// domain_event!(
///     PurchaseFailed,
///     event_type = "purchase.failed.v1",
///     aggregate_id = purchase_id,
///     user = user_id,
///     occurred_at = failed_at,
///     event_id = event_id
/// );
/// ```
#[macro_export]
macro_rules! domain_event {
    (
        $event_name:ident,
        event_type = $event_type:expr,
        aggregate_id = $agg_id_field:ident,
        user = $user_field:ident,
        occurred_at = $occurred_field:ident,
        event_id = $event_id_field:ident
    ) => {
        impl $crate::domain::foundation::DomainEvent for $event_name {
            fn event_type(&self) -> &'static str {
                $event_type
            }

            fn aggregate_id(&self) -> String {
                self.$agg_id_field.to_string()
            }

            fn aggregate_type(&self) -> &'static str {
                "Purchase"
            }

            fn user_id(&self) -> String {
                self.$user_field.to_string()
            }

            fn occurred_at(&self) -> $crate::domain::foundation::Timestamp {
                self.$occurred_field
            }

            fn event_id(&self) -> $crate::domain::foundation::EventId {
                self.$event_id_field.clone()
            }
        }
    };
}

/// Notification id; consumers deduplicate on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transport form of a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: EventId,
    pub event_type: String,

    /// Taken from the `.vN` suffix of `event_type`.
    pub schema_version: u32,

    pub aggregate_id: String,
    pub aggregate_type: String,
    pub user_id: String,
    pub occurred_at: Timestamp,
    pub payload: JsonValue,
}

impl EventEnvelope {
    pub fn new(
        event_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        user_id: impl Into<String>,
        payload: JsonValue,
    ) -> Self {
        let event_type = event_type.into();
        Self {
            event_id: EventId::new(),
            schema_version: Self::extract_version(&event_type),
            event_type,
            aggregate_id: aggregate_id.into(),
            aggregate_type: "Purchase".to_string(),
            user_id: user_id.into(),
            occurred_at: Timestamp::now(),
            payload,
        }
    }

    /// 1 when the type carries no `.vN` suffix.
    pub(crate) fn extract_version(event_type: &str) -> u32 {
        event_type
            .rsplit_once(".v")
            .and_then(|(_, version)| version.parse::<u32>().ok())
            .unwrap_or(1)
    }
}
