//! Strategy lookup from [`ProviderKind`] to adapter.

use std::collections::HashMap;
use std::sync::Arc;

use crate::provider::{PaymentProvider, ProviderError, ProviderKind};

/// Registered payment provider adapters, keyed by kind.
///
/// Built once at startup and shared via `Arc<ProviderRegistry>`.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own [`PaymentProvider::kind`],
    /// replacing any previous adapter of the same kind.
    pub fn register(&mut self, provider: Arc<dyn PaymentProvider>) {
        let kind = provider.kind();
        if self.providers.insert(kind, provider).is_some() {
            tracing::warn!(provider = %kind, "Replaced previously registered payment provider");
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Look up the adapter for `kind`.
    pub fn get(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, ProviderError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or(ProviderError::NotConfigured(kind))
    }

    /// Kinds with a registered adapter.
    pub fn configured(&self) -> Vec<ProviderKind> {
        let mut kinds: Vec<ProviderKind> = self.providers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn unregistered_kind_is_not_configured() {
        let registry = ProviderRegistry::new();
        assert!(matches!(
            registry.get(ProviderKind::Stripe),
            Err(ProviderError::NotConfigured(ProviderKind::Stripe))
        ));
    }

    #[test]
    fn lookup_returns_adapter_of_that_kind() {
        let registry = ProviderRegistry::new()
            .with(Arc::new(ScriptedProvider::new(ProviderKind::Stripe)))
            .with(Arc::new(ScriptedProvider::new(ProviderKind::MercadoPago)));

        let adapter = registry.get(ProviderKind::MercadoPago).unwrap();
        assert_eq!(adapter.kind(), ProviderKind::MercadoPago);
        assert_eq!(
            registry.configured(),
            vec![ProviderKind::MercadoPago, ProviderKind::Stripe]
        );
    }
}
