use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::DonationStatus;
use crate::payments::{self, GatewayClient};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaymentRequest {
    pub amount: f64,
    pub donation_id: String,
}

pub async fn create_payment(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(req): Json<CreatePaymentRequest>,
) -> impl IntoResponse {
    match db::get_donation(&state.db, &req.donation_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return (StatusCode::NOT_FOUND, "Donation not found").into_response(),
        Err(e) => {
            tracing::error!("DB Error: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    let gateway = GatewayClient::new(state.config.gateway.clone());
    let order = match gateway.create_order(req.amount, &req.donation_id).await {
        Ok(o) => o,
        Err(e) => {
            tracing::error!("Payment creation error: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                AxumJson(json!({ "error": "Failed to create payment" })),
            )
                .into_response();
        }
    };

    if let Err(e) = db::set_donation_order(&state.db, &req.donation_id, &order.id).await {
        tracing::error!("Order id write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    AxumJson(json!({
        "orderId": order.id,
        "amount": order.amount,
        "currency": order.currency,
        "paymentUrl": format!(
            "{}/payment?orderId={}&donationId={}",
            state.config.frontend_url, order.id, req.donation_id
        ),
    }))
    .into_response()
}

#[derive(Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
    #[serde(rename = "donationId")]
    pub donation_id: String,
}

/// Signature-verification variant of payment confirmation. The shared secret
/// lives only in this process; a mismatch rejects the request and leaves the
/// donation status untouched.
pub async fn verify_payment(
    State(state): State<AppState>,
    Json(req): Json<VerifyPaymentRequest>,
) -> impl IntoResponse {
    let valid = payments::verify_signature(
        &state.config.gateway.key_secret,
        &req.razorpay_order_id,
        &req.razorpay_payment_id,
        &req.razorpay_signature,
    );

    if !valid {
        tracing::warn!("Signature mismatch for donation {}", req.donation_id);
        return (
            StatusCode::BAD_REQUEST,
            AxumJson(json!({ "error": "Payment verification failed" })),
        )
            .into_response();
    }

    let verified_at = chrono::Utc::now();
    match db::complete_donation(
        &state.db,
        &req.donation_id,
        &req.razorpay_payment_id,
        verified_at,
    )
    .await
    {
        Ok(true) => AxumJson(json!({ "success": true })).into_response(),
        Ok(false) => {
            // Nothing transitioned: either the donation is unknown or it
            // already left pending.
            match db::get_donation_status(&state.db, &req.donation_id).await {
                Ok(Some(DonationStatus::Completed)) => {
                    AxumJson(json!({ "success": true })).into_response()
                }
                Ok(Some(_)) | Ok(None) => (
                    StatusCode::BAD_REQUEST,
                    AxumJson(json!({ "error": "Payment verification failed" })),
                )
                    .into_response(),
                Err(e) => {
                    tracing::error!("DB Error: {}", e);
                    (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
                }
            }
        }
        Err(e) => {
            tracing::error!("Payment verification error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[derive(Deserialize)]
pub struct StatusParams {
    #[serde(default)]
    pub wait: bool,
}

pub async fn payment_status(
    Path(donation_id): Path<String>,
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Query(params): Query<StatusParams>,
) -> impl IntoResponse {
    if params.wait {
        // Polling variant: bounded, fixed interval, silent about timing out.
        payments::poll_donation_completed(&state.db, &donation_id).await;
    }

    match db::get_donation(&state.db, &donation_id).await {
        Ok(Some(donation)) => AxumJson(json!({
            "status": donation.status,
            "orderId": donation.order_id,
            "paymentId": donation.payment_id,
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            AxumJson(json!({ "error": "Donation not found" })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Error fetching payment status: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
