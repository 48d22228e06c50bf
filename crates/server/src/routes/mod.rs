//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Database readiness
//!
//! # Auth (rate limited)
//! POST /auth/register                   - Create account and log in
//! POST /auth/login                      - Log in with phone + password
//! POST /auth/logout                     - Log out
//! GET  /auth/me                         - Current user
//!
//! # Salons
//! GET  /salons                          - Active salons (?q=&limit=&offset=)
//! POST /salons                          - Create salon (owner/admin)
//! GET  /salons/{id}                     - Salon detail
//! PUT  /salons/{id}                     - Update (manager)
//! DELETE /salons/{id}                   - Deactivate (manager)
//! GET  /salons/{id}/services            - Active services
//! POST /salons/{id}/services            - Add service (manager)
//! GET  /salons/{id}/staff               - Active staff
//! POST /salons/{id}/staff               - Add staff member (manager)
//! GET  /salons/{id}/availability        - Open slots (?date=&days=&service_ids=&staff_id=)
//! GET  /salons/{id}/bookings            - Bookings on a local date (manager)
//!
//! # Services and staff
//! PUT|DELETE /services/{id}             - Update, deactivate (manager)
//! PUT|DELETE /staff/{id}                - Update, deactivate (manager)
//! GET|PUT /staff/{id}/shifts            - Weekly schedule
//!
//! # Bookings
//! POST /bookings                        - Reserve (guests allowed)
//! GET  /bookings                        - My bookings
//! GET  /bookings/{id}                   - Detail (customer/manager)
//! POST /bookings/{id}/cancel|confirm|complete
//! POST /bookings/{id}/payments          - Start a payment
//!
//! # Payments
//! GET  /payments/{id}                   - Status and countdown
//! POST /payments/webhook                - Signed bank transfer notification
//!
//! # Notifications
//! GET  /notifications                   - ?unread=true&limit=
//! POST /notifications/{id}/read
//! POST /notifications/read-all
//!
//! # Admin
//! GET  /admin/stats | /admin/users | /admin/bookings?status=
//! PUT  /admin/users/{id}/role
//! POST /admin/payments/{id}/confirm     - Admin or the salon's owner
//! ```

pub mod admin;
pub mod auth;
pub mod bookings;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod salons;
pub mod services;
pub mod staff;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
        .layer(auth_rate_limiter())
}

/// Create the salon routes router.
pub fn salon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(salons::index).post(salons::create))
        .route(
            "/{id}",
            get(salons::show).put(salons::update).delete(salons::deactivate),
        )
        .route(
            "/{id}/services",
            get(salons::services).post(salons::create_service),
        )
        .route("/{id}/staff", get(salons::staff).post(salons::create_staff))
        .route("/{id}/availability", get(salons::availability))
        .route("/{id}/bookings", get(salons::bookings))
}

/// Create the service routes router.
pub fn service_routes() -> Router<AppState> {
    Router::new().route(
        "/{id}",
        put(services::update).delete(services::deactivate),
    )
}

/// Create the staff routes router.
pub fn staff_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", put(staff::update).delete(staff::deactivate))
        .route("/{id}/shifts", get(staff::shifts).put(staff::replace_shifts))
}

/// Create the booking routes router.
pub fn booking_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(bookings::index).post(bookings::create))
        .route("/{id}", get(bookings::show))
        .route("/{id}/cancel", post(bookings::cancel))
        .route("/{id}/confirm", post(bookings::confirm))
        .route("/{id}/complete", post(bookings::complete))
        .route("/{id}/payments", post(bookings::start_payment))
}

/// Create the notification routes router.
pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::index))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", post(notifications::mark_read))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::users))
        .route("/users/{id}/role", put(admin::set_role))
        .route("/bookings", get(admin::bookings))
        .route("/payments/{id}/confirm", post(admin::confirm_payment))
}

/// Create all routes.
///
/// The bank webhook sits outside the API rate limiter so a burst of transfers is
/// never throttled.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .nest("/salons", salon_routes())
        .nest("/services", service_routes())
        .nest("/staff", staff_routes())
        .nest("/bookings", booking_routes())
        .nest("/notifications", notification_routes())
        .nest("/admin", admin_routes())
        .route("/payments/{id}", get(payments::show))
        .layer(api_rate_limiter());

    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/auth", auth_routes())
        .route("/payments/webhook", post(payments::webhook))
        .merge(api)
}
