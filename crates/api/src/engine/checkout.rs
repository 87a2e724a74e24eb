//! Checkout orchestration.
//!
//! Every path settles the free items of the cart right away with a
//! separate `free` order, then opens one order for the items its provider
//! settles. The order and the free enrollments commit before the provider
//! is called, and paid items are only enrolled after a provider answer.
//! Items a path cannot settle stay in the cart.

use campus_core::checkout::{partition, CheckoutItem, CheckoutPartition, CheckoutPath};
use campus_core::error::CoreError;
use campus_core::status::OrderStatus;
use campus_core::types::DbId;
use campus_db::models::order::OrderWithItems;
use campus_db::models::payment::NewPayment;
use campus_db::repositories::{OrderRepo, PaymentRepo};
use campus_events::PlatformEvent;
use campus_payments::{ChargeRequest, ProviderError, ProviderKind, SessionItem};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use super::orders::{self, complete_order, create_order};
use super::PendingEvents;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Result of a checkout request.
#[derive(Debug, Default, Serialize)]
pub struct CheckoutOutcome {
    /// The order for the paid items, if any were checked out.
    pub order: Option<OrderWithItems>,
    /// The completed order settling the free items, if any.
    pub free_order: Option<OrderWithItems>,
    /// Courses the student was enrolled in by this request.
    pub enrolled_course_ids: Vec<DbId>,
    /// Cart items this path could not settle; they stay in the cart.
    pub skipped_course_ids: Vec<DbId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    /// The provider's immediate answer to a direct charge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

/// Token charge parameters supplied by the client.
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeInput {
    pub token: String,
    pub provider: Option<ProviderKind>,
    pub payment_method_id: Option<String>,
    pub installments: Option<i32>,
    pub payer_email: Option<String>,
}

/// Hosted payment page parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentLinkInput {
    pub provider: Option<ProviderKind>,
}

/// Check out only the free items of the cart.
pub async fn free_checkout(state: &AppState, user_id: DbId) -> AppResult<CheckoutOutcome> {
    let items = orders::get_checkout_items(&state.pool, user_id).await?;
    if items.is_empty() {
        return Err(AppError::Core(CoreError::EmptyCart));
    }
    let split = partition(items, CheckoutPath::Free);
    if split.free.is_empty() {
        return Err(AppError::Core(CoreError::NoFreeItems));
    }

    let mut events = PendingEvents::new();
    let mut tx = state.pool.begin().await?;
    let (free_order, enrolled) = settle_free_items(&mut *tx, user_id, &split.free, &mut events)
        .await?
        .unzip();
    tx.commit().await?;
    events.publish(&state.event_bus);

    Ok(CheckoutOutcome {
        free_order,
        enrolled_course_ids: enrolled.unwrap_or_default(),
        skipped_course_ids: course_ids(&split.skipped),
        ..Default::default()
    })
}

/// Open a client-side card session for the card-priced items.
///
/// The paid order waits in `awaiting_payment` until the provider confirms
/// the payment through the webhook.
pub async fn card_checkout(state: &AppState, user_id: DbId) -> AppResult<CheckoutOutcome> {
    let provider = state.providers.get(ProviderKind::Stripe)?;
    let split = load_partition(state, user_id, CheckoutPath::Card).await?;

    let mut outcome = CheckoutOutcome {
        skipped_course_ids: course_ids(&split.skipped),
        ..Default::default()
    };
    let order = open_orders(state, user_id, ProviderKind::Stripe, &split, &mut outcome).await?;
    let Some(order) = order else {
        return Ok(outcome);
    };

    let line_items = session_items(&split.payable, ProviderKind::Stripe);
    let session = provider
        .create_client_session(&line_items, order.order.id)
        .await
        .map_err(|e| provider_failed(order.order.id, e))?;

    let mut conn = state.pool.acquire().await?;
    let updated = OrderRepo::set_provider_refs(
        &mut *conn,
        order.order.id,
        session.session_id.as_deref(),
        None,
    )
    .await?;

    outcome.client_secret = Some(session.client_secret);
    outcome.order = Some(OrderWithItems {
        order: updated,
        items: order.items,
    });
    Ok(outcome)
}

/// Charge a payment token for the paid items synchronously.
///
/// An approved charge completes the order and enrolls its items; any other
/// answer leaves the order `processing` for the webhook to finish.
pub async fn direct_charge_checkout(
    state: &AppState,
    user_id: DbId,
    input: &ChargeInput,
) -> AppResult<CheckoutOutcome> {
    let kind = paid_provider(input.provider)?;
    let provider = state.providers.get(kind)?;
    let split = load_partition(state, user_id, CheckoutPath::DirectCharge).await?;

    let mut outcome = CheckoutOutcome {
        skipped_course_ids: course_ids(&split.skipped),
        ..Default::default()
    };
    let Some(order) = open_orders(state, user_id, kind, &split, &mut outcome).await? else {
        return Ok(outcome);
    };
    let order_id = order.order.id;

    let request = ChargeRequest {
        token: input.token.clone(),
        amount_in_cents: order.order.total_amount_in_cents,
        currency: order.order.currency.clone(),
        order_id,
        user_id,
        payment_method_id: input.payment_method_id.clone(),
        installments: input.installments,
        payer_email: input.payer_email.clone(),
    };
    let charge = provider
        .charge(&request)
        .await
        .map_err(|e| provider_failed(order_id, e))?;
    tracing::info!(
        order_id,
        external_id = %charge.external_id,
        status = charge.status.as_str(),
        "Direct charge answered",
    );

    let mut events = PendingEvents::new();
    let mut tx = state.pool.begin().await?;

    let payment = PaymentRepo::upsert(
        &mut *tx,
        &NewPayment {
            provider: kind.as_str(),
            provider_payment_id: &charge.external_id,
            status: charge.status.as_str(),
            status_detail: charge.status_detail.as_deref(),
            user_id,
            course_id: single_course(&order),
            order_id: Some(order_id),
        },
    )
    .await?;
    events.push(PlatformEvent::payment_updated(
        payment.id,
        &payment.provider,
        &payment.provider_payment_id,
        &payment.status,
        payment.order_id,
    ));
    OrderRepo::set_provider_refs(&mut *tx, order_id, Some(&charge.external_id), None).await?;

    if charge.status.is_approved() {
        let enrolled =
            complete_order(&mut *tx, order_id, Some(&charge.external_id), &mut events).await?;
        outcome.enrolled_course_ids.extend(enrolled);
    } else if OrderRepo::transition(&mut *tx, order_id, OrderStatus::Processing)
        .await?
        .is_none()
    {
        tracing::debug!(order_id, "Order already moved on, left as is");
    }

    let order = orders_with_items(&mut *tx, order_id).await?;
    tx.commit().await?;
    events.publish(&state.event_bus);

    outcome.payment_status = Some(charge.status.as_str().to_string());
    outcome.order = Some(order);
    Ok(outcome)
}

/// Open a hosted payment page for the paid items.
pub async fn payment_link_checkout(
    state: &AppState,
    user_id: DbId,
    input: &PaymentLinkInput,
) -> AppResult<CheckoutOutcome> {
    let kind = paid_provider(input.provider)?;
    let provider = state.providers.get(kind)?;
    let split = load_partition(state, user_id, CheckoutPath::PaymentLink).await?;

    let mut outcome = CheckoutOutcome {
        skipped_course_ids: course_ids(&split.skipped),
        ..Default::default()
    };
    let Some(order) = open_orders(state, user_id, kind, &split, &mut outcome).await? else {
        return Ok(outcome);
    };

    let items = session_items(&split.payable, kind);
    let session = provider
        .create_hosted_session(&items, order.order.id)
        .await
        .map_err(|e| provider_failed(order.order.id, e))?;

    let mut conn = state.pool.acquire().await?;
    let updated = OrderRepo::set_provider_refs(
        &mut *conn,
        order.order.id,
        session.session_id.as_deref(),
        Some(&session.url),
    )
    .await?;

    outcome.payment_url = Some(session.url);
    outcome.order = Some(OrderWithItems {
        order: updated,
        items: order.items,
    });
    Ok(outcome)
}

// ---------------------------------------------------------------------------
// Shared steps
// ---------------------------------------------------------------------------

async fn load_partition(
    state: &AppState,
    user_id: DbId,
    path: CheckoutPath,
) -> AppResult<CheckoutPartition> {
    let items = orders::get_checkout_items(&state.pool, user_id).await?;
    let split = partition(items, path);
    if split.is_empty() {
        return Err(AppError::Core(CoreError::EmptyCart));
    }
    Ok(split)
}

/// In one transaction: reject already-enrolled paid items, settle the free
/// items, and open the paid order in `awaiting_payment`.
///
/// Returns the paid order, or `None` when only free items were checked out.
async fn open_orders(
    state: &AppState,
    user_id: DbId,
    provider: ProviderKind,
    split: &CheckoutPartition,
    outcome: &mut CheckoutOutcome,
) -> AppResult<Option<OrderWithItems>> {
    let mut events = PendingEvents::new();
    let mut tx = state.pool.begin().await?;

    orders::ensure_not_enrolled(&mut *tx, user_id, &split.payable_course_ids()).await?;

    if let Some((free_order, enrolled)) =
        settle_free_items(&mut *tx, user_id, &split.free, &mut events).await?
    {
        outcome.free_order = Some(free_order);
        outcome.enrolled_course_ids.extend(enrolled);
    }

    let order = if split.payable.is_empty() {
        None
    } else {
        let created = create_order(&mut *tx, user_id, provider, &split.payable).await?;
        let order =
            orders::transition(&mut *tx, created.order.id, OrderStatus::AwaitingPayment).await?;
        Some(OrderWithItems {
            order,
            items: created.items,
        })
    };

    tx.commit().await?;
    events.publish(&state.event_bus);
    Ok(order)
}

/// Complete a `free` order for the given items and enroll the student.
///
/// Returns the order and the enrolled course ids, or `None` when there is
/// nothing to settle.
async fn settle_free_items(
    conn: &mut PgConnection,
    user_id: DbId,
    items: &[CheckoutItem],
    events: &mut PendingEvents,
) -> AppResult<Option<(OrderWithItems, Vec<DbId>)>> {
    if items.is_empty() {
        return Ok(None);
    }
    let created = create_order(&mut *conn, user_id, ProviderKind::Free, items).await?;
    let enrolled = complete_order(&mut *conn, created.order.id, None, events).await?;
    let order = orders_with_items(&mut *conn, created.order.id).await?;
    Ok(Some((order, enrolled)))
}

async fn orders_with_items(conn: &mut PgConnection, order_id: DbId) -> AppResult<OrderWithItems> {
    let order = OrderRepo::find_by_id(&mut *conn, order_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Order",
            id: order_id,
        }))?;
    let items = OrderRepo::list_items(&mut *conn, order_id).await?;
    Ok(OrderWithItems { order, items })
}

fn paid_provider(requested: Option<ProviderKind>) -> AppResult<ProviderKind> {
    match requested.unwrap_or(ProviderKind::MercadoPago) {
        ProviderKind::Free => Err(AppError::Core(CoreError::Validation(
            "The free provider cannot settle paid items".into(),
        ))),
        kind => Ok(kind),
    }
}

fn session_items(items: &[CheckoutItem], provider: ProviderKind) -> Vec<SessionItem> {
    items
        .iter()
        .map(|i| SessionItem {
            course_id: i.course_id,
            title: i.title.clone(),
            price_in_cents: i.price_in_cents,
            currency: i.currency.clone(),
            provider_price_ref: match provider {
                ProviderKind::Stripe => i.stripe_price_id.clone(),
                _ => None,
            },
        })
        .collect()
}

/// A failed provider call leaves the order open in `awaiting_payment` so the
/// user can retry; nothing is rolled back.
fn provider_failed(order_id: DbId, error: ProviderError) -> AppError {
    tracing::warn!(
        order_id,
        error = %error,
        "Payment provider call failed, order left awaiting payment",
    );
    error.into()
}

fn single_course(order: &OrderWithItems) -> Option<DbId> {
    match order.items.as_slice() {
        [only] => Some(only.course_id),
        _ => None,
    }
}

fn course_ids(items: &[CheckoutItem]) -> Vec<DbId> {
    items.iter().map(|i| i.course_id).collect()
}
