//! Inbound payment provider notifications.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use campus_core::webhook::WebhookNotification;
use campus_payments::ProviderKind;

use crate::engine::reconciler;
use crate::state::AppState;

/// POST /api/v1/webhooks/{provider}
///
/// Always answers `200` so the provider does not retry payloads this
/// platform cannot use. Processing runs in a tracked background task.
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Bytes,
) -> StatusCode {
    let Some(kind) = ProviderKind::parse(&provider) else {
        tracing::warn!(provider = %provider, "Webhook for unknown provider");
        return StatusCode::OK;
    };

    let notification: WebhookNotification = match serde_json::from_slice(&body) {
        Ok(n) => n,
        Err(e) => {
            tracing::warn!(provider = %kind, error = %e, "Unparseable webhook body");
            return StatusCode::OK;
        }
    };

    let task_state = state.clone();
    state.background.spawn(async move {
        match reconciler::handle_notification(&task_state, kind, &notification).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(provider = %kind, "Webhook notification dropped");
            }
            Err(e) => {
                tracing::error!(provider = %kind, error = %e, "Webhook processing failed");
            }
        }
    });

    StatusCode::OK
}
