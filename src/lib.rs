use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use opendal::Operator;

pub mod auth;
pub mod config;
pub mod db;
pub mod payments;
pub mod routes;
pub mod storage;
pub mod upi;

#[derive(Clone)]
pub struct AppState {
    pub db: mongodb::Database,
    pub storage: Operator,
    pub config: Arc<config::AppConfig>,
    pub index_template: String,
}

/// API and auth routes. Middleware, state, and the SPA shell are layered on
/// by the binary.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Donations
        .route(
            "/api/donations",
            get(routes::donations::list_donations).post(routes::donations::create_donation),
        )
        .route(
            "/api/donations/user",
            get(routes::donations::list_user_donations),
        )
        // Payments
        .route(
            "/api/payments/create-payment",
            post(routes::payments::create_payment),
        )
        .route(
            "/api/payments/verify-payment",
            post(routes::payments::verify_payment),
        )
        .route(
            "/api/payments/payment-status/{id}",
            get(routes::payments::payment_status),
        )
        // Recipient onboarding
        .route("/api/recipients/register", post(routes::recipients::register))
        .route("/api/recipients/me", get(routes::recipients::my_profile))
        // KYC
        .route(
            "/api/verification",
            post(routes::verification::submit),
        )
        .route(
            "/api/verification/upload-url",
            post(routes::verification::upload_url),
        )
        .route("/api/verification/status", get(routes::verification::status))
        .route(
            "/api/verification/decision",
            post(routes::verification::decide_document),
        )
        .route("/api/verification/bank", post(routes::verification::decide_bank))
        // Stories
        .route(
            "/stories",
            get(routes::stories::list_stories).post(routes::stories::create_story),
        )
        .route(
            "/stories/{id}",
            delete(routes::stories::delete_story).put(routes::stories::update_story),
        )
        // Session / profile
        .route("/api/me", get(auth::me).put(auth::update_me))
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::signin))
        .route("/auth/login/{provider}", get(auth::login))
        .route("/auth/callback/{provider}", get(auth::callback))
        .route("/auth/logout", post(auth::logout))
}
