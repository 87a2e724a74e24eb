//! Payment webhook reconciler.
//!
//! A notification only names a payment. Its status is always re-fetched
//! from the provider, recorded on the local `payments` row, and an
//! approved payment enrolls the payer. Deliveries may repeat or arrive out
//! of order; re-processing the same payment writes nothing new.

use campus_core::enrollment::{EnrollMode, EnrollmentSource};
use campus_core::status::OrderStatus;
use campus_core::webhook::WebhookNotification;
use campus_db::models::payment::{NewPayment, Payment};
use campus_db::repositories::{OrderRepo, PaymentRepo};
use campus_events::PlatformEvent;
use campus_payments::{PaymentStatus, ProviderKind, StatusReport};
use sqlx::PgConnection;

use super::{ledger, orders, PendingEvents};
use crate::error::AppResult;
use crate::state::AppState;

/// Process one provider notification.
///
/// Returns `false` when the notification was dropped: not a payment event,
/// or a payment this platform has no record of (the provider retries).
pub async fn handle_notification(
    state: &AppState,
    provider: ProviderKind,
    notification: &WebhookNotification,
) -> AppResult<bool> {
    let Some(external_id) = notification.payment_id() else {
        tracing::debug!(
            provider = %provider,
            event_type = %notification.event_type,
            "Ignoring non-payment notification",
        );
        return Ok(false);
    };

    let adapter = state.providers.get(provider)?;
    let report = adapter.fetch_status(&external_id).await?;

    let mut events = PendingEvents::new();
    let mut tx = state.pool.begin().await?;

    let Some(payment) = record_status(&mut *tx, provider, &external_id, &report).await? else {
        tracing::info!(
            provider = %provider,
            external_id = %external_id,
            "No local payment or order for notification, dropping",
        );
        return Ok(false);
    };
    events.push(PlatformEvent::payment_updated(
        payment.id,
        &payment.provider,
        &payment.provider_payment_id,
        &payment.status,
        payment.order_id,
    ));

    match &report.status {
        PaymentStatus::Approved => {
            if let Some(order_id) = payment.order_id {
                orders::complete_order(&mut *tx, order_id, Some(&external_id), &mut events)
                    .await?;
            } else if let Some(course_id) = payment.course_id {
                let outcome = ledger::enroll(
                    &mut *tx,
                    payment.user_id,
                    course_id,
                    EnrollmentSource::Direct,
                    Some(&external_id),
                    EnrollMode::Idempotent,
                )
                .await?;
                events.record(&outcome);
            } else {
                tracing::warn!(
                    payment_id = payment.id,
                    "Approved payment has neither an order nor a course",
                );
            }
        }
        // A rejected attempt keeps the order open: the payer may retry with
        // another payment on the same order.
        PaymentStatus::Pending
        | PaymentStatus::InProcess
        | PaymentStatus::Rejected
        | PaymentStatus::Cancelled => {
            if let Some(order_id) = payment.order_id {
                OrderRepo::transition(&mut *tx, order_id, OrderStatus::Processing).await?;
            }
        }
        PaymentStatus::Refunded | PaymentStatus::Other(_) => {}
    }

    tx.commit().await?;
    events.publish(&state.event_bus);

    tracing::info!(
        provider = %provider,
        external_id = %external_id,
        status = report.status.as_str(),
        order_id = ?payment.order_id,
        "Payment notification processed",
    );
    Ok(true)
}

/// Update the stored status of the payment, creating the row from the
/// order the provider reports it was scoped to when none exists yet.
async fn record_status(
    conn: &mut PgConnection,
    provider: ProviderKind,
    external_id: &str,
    report: &StatusReport,
) -> AppResult<Option<Payment>> {
    let status = report.status.as_str();
    let detail = report.status_detail.as_deref();

    if let Some(payment) =
        PaymentRepo::update_status(&mut *conn, provider.as_str(), external_id, status, detail)
            .await?
    {
        return Ok(Some(payment));
    }

    let Some(order_id) = report.order_reference else {
        return Ok(None);
    };
    let Some(order) = OrderRepo::find_by_id(&mut *conn, order_id).await? else {
        return Ok(None);
    };
    if order.provider != provider.as_str() {
        tracing::warn!(
            order_id,
            order_provider = %order.provider,
            provider = %provider,
            "Notification references an order of another provider",
        );
        return Ok(None);
    }

    let items = OrderRepo::list_items(&mut *conn, order_id).await?;
    let course_id = match items.as_slice() {
        [only] => Some(only.course_id),
        _ => None,
    };
    let payment = PaymentRepo::upsert(
        &mut *conn,
        &NewPayment {
            provider: provider.as_str(),
            provider_payment_id: external_id,
            status,
            status_detail: detail,
            user_id: order.user_id,
            course_id,
            order_id: Some(order.id),
        },
    )
    .await?;
    tracing::debug!(order_id, external_id, "Payment recorded from order reference");
    Ok(Some(payment))
}
