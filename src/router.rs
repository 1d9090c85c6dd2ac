use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::admin_handlers as admin;
use crate::handlers::{self, AppState};
use crate::{kyc_handler, payment_handler};

/// Every `/api` route. Callers wrap this in rate limiting before merging.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/api/auth/send-otp", post(handlers::send_otp))
        .route("/api/auth/verify-otp", post(handlers::verify_otp))
        .route("/api/auth/admin/login", post(handlers::admin_login))
        .route("/api/auth/employee/login", post(handlers::employee_login))
        .route("/api/auth/logout", post(handlers::logout))
        // User
        .route("/api/user/profile", get(handlers::get_profile))
        .route("/api/user/subscribe", post(handlers::subscribe))
        .route("/api/user/cibil-check", get(handlers::cibil_check))
        .route("/api/user/offer-eligibility", get(handlers::offer_eligibility))
        // KYC
        .route("/api/kyc/start", post(kyc_handler::start_kyc))
        .route("/api/kyc/callback/:auth_code", post(kyc_handler::kyc_callback))
        // Payments
        .route("/api/payments/create-order", post(payment_handler::create_order))
        .route("/api/payments/order-status", post(payment_handler::order_status))
        .route("/api/payments/callback", post(payment_handler::payment_callback))
        // Public catalogs
        .route("/api/loan-providers/list", get(handlers::list_loan_providers))
        .route("/api/loan-providers/:id", get(handlers::get_loan_provider))
        .route(
            "/api/credit-card-providers/list",
            get(handlers::list_credit_card_providers),
        )
        .route(
            "/api/credit-card-providers/:id",
            get(handlers::get_credit_card_provider),
        )
        .route("/api/offer-limits/list", get(handlers::get_offer_limit))
        // Admin: loan providers
        .route("/api/admin/loan-providers/create", post(admin::create_loan_provider))
        .route("/api/admin/loan-providers/list", get(admin::list_loan_providers))
        .route("/api/admin/loan-providers/update/:id", put(admin::update_loan_provider))
        .route("/api/admin/loan-providers/delete/:id", delete(admin::delete_loan_provider))
        // Admin: credit-card providers
        .route(
            "/api/admin/credit-card-providers/create",
            post(admin::create_credit_card_provider),
        )
        .route(
            "/api/admin/credit-card-providers/list",
            get(admin::list_credit_card_providers),
        )
        .route(
            "/api/admin/credit-card-providers/update/:id",
            put(admin::update_credit_card_provider),
        )
        .route(
            "/api/admin/credit-card-providers/delete/:id",
            delete(admin::delete_credit_card_provider),
        )
        // Admin: offer limit
        .route("/api/admin/offer-limits/create", post(admin::create_offer_limit))
        .route("/api/admin/offer-limits/list", get(admin::get_offer_limit))
        .route("/api/admin/offer-limits/update", put(admin::update_offer_limit))
        // Admin: employees
        .route("/api/admin/employees/create", post(admin::create_employee))
        .route("/api/admin/employees/list", get(admin::list_employees))
        .route("/api/admin/employees/update/:id", put(admin::update_employee))
        .route("/api/admin/employees/delete/:id", delete(admin::delete_employee))
        // Admin: users
        .route("/api/admin/users/list", get(admin::list_users))
        .route("/api/admin/users/:id", get(admin::get_user))
        .route("/api/admin/users/update/:id", put(admin::update_user))
}

/// Final app: health check (outside any rate limit), the given API routes,
/// tracing and CORS.
pub fn build_app(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
