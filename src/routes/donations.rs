use axum::{
    extract::{Json, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::{Donation, DonationStatus};
use crate::upi::{self, PaymentApp};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDonationRequest {
    pub amount: f64,
    pub message: Option<String>,
    #[serde(default)]
    pub is_anonymous: bool,
    pub payment_method: PaymentApp,
    #[serde(rename = "recipientUPI")]
    pub recipient_upi: String,
}

pub async fn create_donation(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    headers: HeaderMap,
    Json(req): Json<CreateDonationRequest>,
) -> impl IntoResponse {
    if !upi::is_valid_amount(req.amount) {
        return (
            StatusCode::BAD_REQUEST,
            "Please enter a valid amount between ₹1 and ₹100,000",
        )
            .into_response();
    }
    if !upi::is_valid_upi(&req.recipient_upi) {
        return (StatusCode::BAD_REQUEST, "Please enter a valid UPI ID").into_response();
    }

    let order_id = upi::generate_order_id();
    let now = chrono::Utc::now();
    let donor_name = if req.is_anonymous {
        "Anonymous".to_string()
    } else {
        user.name.clone()
    };

    let donation = Donation {
        id: Uuid::new_v4().to_string(),
        donor_id: user.id.clone(),
        donor_name,
        amount: req.amount,
        message: req.message,
        is_anonymous: req.is_anonymous,
        status: DonationStatus::Pending,
        payment_method: req.payment_method.as_str().to_string(),
        order_id: order_id.clone(),
        payment_id: None,
        recipient_upi: req.recipient_upi.clone(),
        recipient_name: req.recipient_upi.clone(),
        timestamp: now,
        verified_at: None,
    };

    if let Err(e) = db::create_donation(&state.db, &donation).await {
        tracing::error!("DB Error: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    // Second, non-transactional write; a failure here leaves the donation in
    // place and the stats behind.
    if let Err(e) =
        db::record_donation_stats(&state.db, &user.id, &donation.id, req.amount, now).await
    {
        tracing::error!("Stats update failed for {}: {}", donation.id, e);
    }

    let deep_link = upi::deep_link(
        req.payment_method,
        &req.recipient_upi,
        &state.config.upi_payee_name,
        req.amount,
        &order_id,
    );
    let qr = upi::qr_payload(&req.recipient_upi, &req.recipient_upi, req.amount, &order_id);
    let open_app = headers
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(upi::is_mobile_user_agent)
        .unwrap_or(false);

    (
        StatusCode::CREATED,
        AxumJson(serde_json::json!({
            "id": donation.id,
            "orderId": order_id,
            "status": "pending",
            "deepLink": deep_link,
            "qr": qr,
            "openApp": open_app,
        })),
    )
        .into_response()
}

pub async fn list_donations(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::list_donations(&state.db).await {
        Ok(donations) => AxumJson(donations).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

pub async fn list_user_donations(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::list_user_donations(&state.db, &user.id).await {
        Ok(donations) => AxumJson(donations).into_response(),
        Err(e) => {
            tracing::error!("DB Query Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}
