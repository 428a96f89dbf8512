use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use regex::Regex;
use serde::Deserialize;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::{ProfileStatus, RecipientProfile, Role, UserRole, VerificationStatus};
use crate::AppState;

/// Lowest campaign goal a recipient may set, in rupees.
pub const MIN_CAMPAIGN_GOAL: f64 = 1000.0;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRecipientRequest {
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub story: String,
    pub campaign_goal: f64,
    pub bank_account: String,
    pub ifsc_code: String,
    #[serde(default)]
    pub accepted_terms: bool,
}

/// Step 1 of the onboarding form: personal information.
fn validate_personal(req: &RegisterRecipientRequest) -> Result<(), &'static str> {
    if req.full_name.trim().is_empty()
        || req.phone_number.trim().is_empty()
        || req.address.trim().is_empty()
        || req.city.trim().is_empty()
        || req.state.trim().is_empty()
        || req.pincode.trim().is_empty()
    {
        return Err("Please fill in all required fields");
    }
    let phone = Regex::new(r"^[0-9]{10}$").expect("phone pattern");
    if !phone.is_match(&req.phone_number) {
        return Err("Please enter a valid 10-digit phone number");
    }
    Ok(())
}

/// Step 2: the narrative and campaign goal.
fn validate_story(req: &RegisterRecipientRequest) -> Result<(), &'static str> {
    if req.story.trim().is_empty() {
        return Err("Please fill in all required fields");
    }
    if !req.campaign_goal.is_finite() || req.campaign_goal < MIN_CAMPAIGN_GOAL {
        return Err("Campaign goal must be at least ₹1,000");
    }
    Ok(())
}

/// Step 3: bank details and terms.
fn validate_bank(req: &RegisterRecipientRequest) -> Result<(), &'static str> {
    if req.bank_account.trim().is_empty() {
        return Err("Please fill in all required fields");
    }
    let ifsc = Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").expect("ifsc pattern");
    if !ifsc.is_match(&req.ifsc_code) {
        return Err("Please enter a valid IFSC code");
    }
    if !req.accepted_terms {
        return Err("Please accept the terms and conditions");
    }
    Ok(())
}

fn validate_registration(req: &RegisterRecipientRequest) -> Result<(), &'static str> {
    validate_personal(req)?;
    validate_story(req)?;
    validate_bank(req)
}

/// Registration is blocked once the role document already says recipient.
fn registration_blocked(role: Option<&UserRole>) -> bool {
    matches!(role, Some(r) if r.role == Role::Recipient)
}

pub async fn register(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<RegisterRecipientRequest>,
) -> impl IntoResponse {
    if let Err(message) = validate_registration(&req) {
        return (StatusCode::BAD_REQUEST, message).into_response();
    }

    match db::get_user_role(&state.db, &user.id).await {
        Ok(role) if registration_blocked(role.as_ref()) => {
            return (
                StatusCode::CONFLICT,
                "You are already registered as a recipient",
            )
                .into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!("Role lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    }

    // Role flip and profile creation are two separate writes; a crash in
    // between leaves a half-registered user.
    if let Err(e) = db::set_user_role(&state.db, &user.id, Role::Recipient).await {
        tracing::error!("Role write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    let now = chrono::Utc::now();
    let profile = RecipientProfile {
        id: user.id.clone(),
        user_id: user.id.clone(),
        email: user.email.clone(),
        full_name: req.full_name,
        phone_number: req.phone_number,
        address: req.address,
        city: req.city,
        state: req.state,
        pincode: req.pincode,
        story: req.story,
        campaign_goal: req.campaign_goal,
        bank_account: req.bank_account,
        ifsc_code: req.ifsc_code,
        accepted_terms: req.accepted_terms,
        status: ProfileStatus::Pending,
        total_received: 0.0,
        is_verified: false,
        kyc_status: VerificationStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = db::create_recipient_profile(&state.db, &profile).await {
        tracing::error!("Recipient profile write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    (StatusCode::CREATED, AxumJson(profile)).into_response()
}

pub async fn my_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> impl IntoResponse {
    match db::get_recipient_profile(&state.db, &user.id).await {
        Ok(Some(profile)) => AxumJson(profile).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Not registered as a recipient").into_response(),
        Err(e) => {
            tracing::error!("Recipient profile lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> RegisterRecipientRequest {
        RegisterRecipientRequest {
            full_name: "Asha Devi".to_string(),
            phone_number: "9876543210".to_string(),
            address: "12 MG Road".to_string(),
            city: "Lucknow".to_string(),
            state: "UP".to_string(),
            pincode: "226001".to_string(),
            story: "Raising two children on my own.".to_string(),
            campaign_goal: 25_000.0,
            bank_account: "001122334455".to_string(),
            ifsc_code: "SBIN0123456".to_string(),
            accepted_terms: true,
        }
    }

    #[test]
    fn accepts_a_complete_registration() {
        assert!(validate_registration(&valid_request()).is_ok());
    }

    #[test]
    fn phone_must_be_ten_digits() {
        let mut req = valid_request();
        req.phone_number = "12345".to_string();
        assert!(validate_personal(&req).is_err());
        req.phone_number = "98765432101".to_string();
        assert!(validate_personal(&req).is_err());
    }

    #[test]
    fn campaign_goal_floor() {
        let mut req = valid_request();
        req.campaign_goal = 999.0;
        assert!(validate_story(&req).is_err());
        req.campaign_goal = 1000.0;
        assert!(validate_story(&req).is_ok());
    }

    #[test]
    fn ifsc_format_is_case_sensitive() {
        let mut req = valid_request();
        req.ifsc_code = "sbin0123456".to_string();
        assert!(validate_bank(&req).is_err());
        req.ifsc_code = "SBIN0123456".to_string();
        assert!(validate_bank(&req).is_ok());
        req.ifsc_code = "SBIN1123456".to_string();
        assert!(validate_bank(&req).is_err());
    }

    #[test]
    fn second_registration_is_blocked_for_recipients() {
        let recipient = UserRole {
            user_id: "u1".to_string(),
            role: Role::Recipient,
            verification_status: None,
            updated_at: None,
        };
        let donor = UserRole {
            user_id: "u1".to_string(),
            role: Role::Donor,
            verification_status: None,
            updated_at: None,
        };
        assert!(registration_blocked(Some(&recipient)));
        assert!(!registration_blocked(Some(&donor)));
        assert!(!registration_blocked(None));
    }
}
