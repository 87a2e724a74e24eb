//! Inbound payment-provider notification payloads.
//!
//! Providers post `{ "type": ..., "data": { "id": ... } }` where the id may
//! be a JSON string or number. The notification is only a hint to re-fetch
//! the payment from the provider, so nothing else in the body is trusted.

use serde::Deserialize;

/// The only notification type the reconciler acts on.
pub const PAYMENT_EVENT_TYPE: &str = "payment";

/// Body of a provider webhook call.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

/// The `data` object of a notification.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub id: ExternalId,
}

/// A provider-side identifier that may arrive as a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExternalId {
    Text(String),
    Number(i64),
}

impl ExternalId {
    /// Normalized string form used as `provider_payment_id`.
    pub fn as_string(&self) -> String {
        match self {
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
        }
    }
}

impl WebhookNotification {
    /// The external payment id, if this is a payment notification with a
    /// non-empty id.
    pub fn payment_id(&self) -> Option<String> {
        if self.event_type != PAYMENT_EVENT_TYPE {
            return None;
        }
        self.data
            .as_ref()
            .map(|d| d.id.as_string())
            .filter(|id| !id.is_empty())
    }
}
