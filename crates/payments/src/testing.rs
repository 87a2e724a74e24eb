//! Scripted in-memory provider for tests.
//!
//! Behaves like a provider that remembers every payment it has seen: charges
//! and client sessions register a payment whose later
//! [`fetch_status`](PaymentProvider::fetch_status) reports the order it was
//! scoped to. Tests flip payment statuses with [`ScriptedProvider::set_status`]
//! to simulate the provider settling a payment before a webhook arrives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use campus_core::types::DbId;

use crate::provider::{
    ChargeRequest, ChargeResult, ClientSession, HostedSession, PaymentProvider, PaymentStatus,
    ProviderError, ProviderKind, SessionItem, StatusReport,
};

pub struct ScriptedProvider {
    kind: ProviderKind,
    charge_status: Mutex<PaymentStatus>,
    payments: Mutex<HashMap<String, StatusReport>>,
    fail_requests: AtomicBool,
    charges: AtomicUsize,
    fetches: AtomicUsize,
}

impl ScriptedProvider {
    /// A provider whose charges are approved until told otherwise.
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            charge_status: Mutex::new(PaymentStatus::Approved),
            payments: Mutex::new(HashMap::new()),
            fail_requests: AtomicBool::new(false),
            charges: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Status returned by subsequent charges.
    pub fn set_charge_status(&self, status: PaymentStatus) {
        *self.charge_status.lock().expect("scripted provider lock poisoned") = status;
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.fail_requests.store(unreachable, Ordering::SeqCst);
    }

    /// Set the provider-side state of a payment.
    pub fn set_status(
        &self,
        external_id: &str,
        status: PaymentStatus,
        order_reference: Option<DbId>,
    ) {
        self.payments
            .lock()
            .expect("scripted provider lock poisoned")
            .insert(
                external_id.to_string(),
                StatusReport {
                    status,
                    status_detail: None,
                    order_reference,
                },
            );
    }

    /// Number of `charge` calls received.
    pub fn charge_count(&self) -> usize {
        self.charges.load(Ordering::SeqCst)
    }

    /// Number of `fetch_status` calls received.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// The payment id a client session for `order_id` is registered under.
    pub fn session_payment_id(order_id: DbId) -> String {
        format!("pi_{order_id}")
    }

    fn check_reachable(&self) -> Result<(), ProviderError> {
        if self.fail_requests.load(Ordering::SeqCst) {
            return Err(ProviderError::Request(format!("{} unreachable", self.kind)));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentProvider for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn create_hosted_session(
        &self,
        items: &[SessionItem],
        order_id: DbId,
    ) -> Result<HostedSession, ProviderError> {
        self.check_reachable()?;
        if items.is_empty() {
            return Err(ProviderError::InvalidResponse("no items".into()));
        }
        Ok(HostedSession {
            url: format!("https://pay.example.test/{}/checkout/{order_id}", self.kind),
            session_id: Some(format!("pref_{order_id}")),
        })
    }

    async fn create_client_session(
        &self,
        line_items: &[SessionItem],
        order_id: DbId,
    ) -> Result<ClientSession, ProviderError> {
        self.check_reachable()?;
        if line_items.iter().any(|i| i.provider_price_ref.is_none()) {
            return Err(ProviderError::InvalidResponse(
                "line item without a price reference".into(),
            ));
        }
        let payment_id = Self::session_payment_id(order_id);
        self.set_status(&payment_id, PaymentStatus::Pending, Some(order_id));
        Ok(ClientSession {
            client_secret: format!("{payment_id}_secret"),
            session_id: Some(payment_id),
        })
    }

    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeResult, ProviderError> {
        self.check_reachable()?;
        let n = self.charges.fetch_add(1, Ordering::SeqCst) + 1;
        let status = self
            .charge_status
            .lock()
            .expect("scripted provider lock poisoned")
            .clone();
        let external_id = format!("{}-{}-{n}", self.kind, uuid::Uuid::new_v4().simple());
        self.set_status(&external_id, status.clone(), Some(request.order_id));
        Ok(ChargeResult {
            external_id,
            status_detail: Some(format!("scripted_{}", status.as_str())),
            status,
        })
    }

    async fn fetch_status(&self, external_id: &str) -> Result<StatusReport, ProviderError> {
        self.check_reachable()?;
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.payments
            .lock()
            .expect("scripted provider lock poisoned")
            .get(external_id)
            .cloned()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("unknown payment {external_id}")))
    }
}
