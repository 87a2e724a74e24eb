//! Provider contract and the value types that cross it.

use std::fmt;

use async_trait::async_trait;
use campus_core::order::{PROVIDER_FREE, PROVIDER_MERCADOPAGO, PROVIDER_STRIPE};
use campus_core::types::{Cents, DbId};
use serde::{Deserialize, Serialize, Serializer};

// ---------------------------------------------------------------------------
// ProviderKind
// ---------------------------------------------------------------------------

/// Which provider settles an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Card network with client-side sessions.
    Stripe,
    /// Card-token charges and hosted payment links.
    #[serde(rename = "mercadopago")]
    MercadoPago,
    /// No external party; zero-priced orders.
    Free,
}

impl ProviderKind {
    /// The value stored in `orders.provider` / `payments.provider`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stripe => PROVIDER_STRIPE,
            Self::MercadoPago => PROVIDER_MERCADOPAGO,
            Self::Free => PROVIDER_FREE,
        }
    }

    /// Parse a stored or path-supplied provider tag.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            PROVIDER_STRIPE => Some(Self::Stripe),
            PROVIDER_MERCADOPAGO => Some(Self::MercadoPago),
            PROVIDER_FREE => Some(Self::Free),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PaymentStatus
// ---------------------------------------------------------------------------

/// Provider-reported payment status, normalized across providers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Approved,
    Pending,
    InProcess,
    Rejected,
    Cancelled,
    Refunded,
    /// Any status this crate does not model; stored verbatim.
    Other(String),
}

impl PaymentStatus {
    /// The value stored in `payments.status`.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::InProcess => "in_process",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::Other(s) => s,
        }
    }

    /// Parse a provider status string. Unknown values are kept as `Other`.
    pub fn parse(value: &str) -> Self {
        match value {
            "approved" | "succeeded" => Self::Approved,
            "pending" | "requires_action" | "requires_confirmation" => Self::Pending,
            "in_process" | "processing" => Self::InProcess,
            "rejected" | "requires_payment_method" => Self::Rejected,
            "cancelled" | "canceled" => Self::Cancelled,
            "refunded" => Self::Refunded,
            other => Self::Other(other.to_string()),
        }
    }

    /// Only an approved payment entitles the payer to enrollment.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

impl Serialize for PaymentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One line sent to a provider when opening a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionItem {
    pub course_id: DbId,
    pub title: String,
    pub price_in_cents: Cents,
    pub currency: String,
    /// Provider-side price/product reference, when the provider needs one.
    pub provider_price_ref: Option<String>,
}

/// A hosted payment page opened for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostedSession {
    pub url: String,
    /// Provider-side id of the session or preference.
    pub session_id: Option<String>,
}

/// A client-side payment session opened for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClientSession {
    pub client_secret: String,
    /// Provider-side id of the payment intent.
    pub session_id: Option<String>,
}

/// A synchronous token charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    pub token: String,
    pub amount_in_cents: Cents,
    pub currency: String,
    pub order_id: DbId,
    pub user_id: DbId,
    pub payment_method_id: Option<String>,
    pub installments: Option<i32>,
    pub payer_email: Option<String>,
}

/// The provider's immediate answer to a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeResult {
    pub external_id: String,
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
}

/// The provider's current view of a payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub status: PaymentStatus,
    pub status_detail: Option<String>,
    /// The order id the session or charge was scoped to, when the provider
    /// echoes it back.
    pub order_reference: Option<DbId>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by provider adapters and the registry.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// No adapter is registered for this provider.
    #[error("Payment provider '{0}' is not configured")]
    NotConfigured(ProviderKind),

    /// The adapter does not support the requested operation.
    #[error("Payment provider '{kind}' does not support {operation}")]
    Unsupported {
        kind: ProviderKind,
        operation: &'static str,
    },

    /// Transport-level failure talking to the provider.
    #[error("Payment provider request failed: {0}")]
    Request(String),

    /// The provider answered with something the adapter could not interpret.
    #[error("Payment provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

// ---------------------------------------------------------------------------
// PaymentProvider
// ---------------------------------------------------------------------------

/// Contract implemented by every payment provider adapter.
///
/// Adapters are stateless from the engine's point of view and are shared
/// behind `Arc<dyn PaymentProvider>` in the [`ProviderRegistry`](crate::ProviderRegistry).
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Which provider this adapter talks to.
    fn kind(&self) -> ProviderKind;

    /// Open a hosted payment page for the order and return its URL.
    async fn create_hosted_session(
        &self,
        items: &[SessionItem],
        order_id: DbId,
    ) -> Result<HostedSession, ProviderError>;

    /// Open a client-side payment session scoped to the order.
    async fn create_client_session(
        &self,
        line_items: &[SessionItem],
        order_id: DbId,
    ) -> Result<ClientSession, ProviderError>;

    /// Charge a payment token synchronously.
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult, ProviderError>;

    /// Fetch the provider's current status of a payment.
    async fn fetch_status(&self, external_id: &str) -> Result<StatusReport, ProviderError>;
}
