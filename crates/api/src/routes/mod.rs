pub mod admin;
pub mod cart;
pub mod checkout;
pub mod enrollments;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /cart                                            list (student)
/// /cart/items                                      add
/// /cart/items/{course_id}                          remove
///
/// /checkout/free                                   free items only
/// /checkout/card                                   client-side card session
/// /checkout/charge                                 synchronous token charge
/// /checkout/payment-link                           hosted payment page
///
/// /orders                                          list own orders
/// /orders/{id}                                     get with items (owner or admin)
///
/// /enrollments                                     list own enrollments
/// /enrollments/{course_id}                         get one
///
/// /admin/courses/{id}/enrollments                  bulk enroll (admin only)
/// /admin/courses/{id}/enrollments/{user_id}      unenroll
/// /admin/groups/{id}/courses                       unlink (DELETE, body)
/// /admin/groups/{id}/courses/{course_id}           link (PUT)
/// /admin/groups/{id}/members                       add member
/// /admin/groups/{id}/members/{user_id}             remove member
/// /admin/users/{id}/groups                         replace groups (PUT)
///
/// /webhooks/{provider}                             provider notifications (public)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/cart", cart::router())
        .nest("/checkout", checkout::router())
        .nest("/orders", orders::router())
        .nest("/enrollments", enrollments::router())
        .nest("/admin", admin::router())
        .nest("/webhooks", webhooks::router())
}
