//! Payment provider seam.
//!
//! - [`PaymentProvider`]: the contract every provider adapter implements.
//! - [`ProviderKind`]: the tagged union of providers an order can use.
//! - [`ProviderRegistry`]: strategy lookup from kind to adapter, so the
//!   checkout orchestrator never branches on provider names.
//!
//! Network adapters are supplied by the deployment. `testing` builds ship
//! a scripted in-memory adapter for integration tests.

pub mod provider;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use provider::{
    ChargeRequest, ChargeResult, ClientSession, HostedSession, PaymentProvider, PaymentStatus,
    ProviderError, ProviderKind, SessionItem, StatusReport,
};
pub use registry::ProviderRegistry;
