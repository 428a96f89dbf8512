use chrono::Utc;
use hmac::{Hmac, Mac};
use regex::Regex;
use sha2::Sha256;

use lifther_server::db::models::{Donation, DonationStatus};
use lifther_server::payments::verify_signature;
use lifther_server::upi;

fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn pending_donation(order_id: &str) -> Donation {
    Donation {
        id: "d-1".to_string(),
        donor_id: "u-1".to_string(),
        donor_name: "Asha".to_string(),
        amount: 500.0,
        message: Some("Stay strong".to_string()),
        is_anonymous: false,
        status: DonationStatus::Pending,
        payment_method: "phonepe".to_string(),
        order_id: order_id.to_string(),
        payment_id: None,
        recipient_upi: "test@ybl".to_string(),
        recipient_name: "test@ybl".to_string(),
        timestamp: Utc::now(),
        verified_at: None,
    }
}

#[test]
fn submission_scenario_five_hundred_rupees() {
    // Inputs the submission flow accepts without any store write failing.
    assert!(upi::is_valid_amount(500.0));
    assert!(upi::is_valid_upi("test@ybl"));

    let order_id = upi::generate_order_id();
    let pattern = Regex::new(r"^MGK\d+-[a-z0-9]{9}$").expect("pattern");
    assert!(pattern.is_match(&order_id), "order id was {}", order_id);

    let donation = pending_donation(&order_id);
    let wire = serde_json::to_value(&donation).expect("serialize");
    assert_eq!(wire["status"], serde_json::json!("pending"));
    assert_eq!(wire["donorId"], serde_json::json!("u-1"));
    assert_eq!(wire["recipientUPI"], serde_json::json!("test@ybl"));
    assert_eq!(wire["orderId"], serde_json::json!(order_id));
    assert!(wire.get("verifiedAt").is_none());
}

#[test]
fn verification_accepts_only_the_matching_signature() {
    let order_id = upi::generate_order_id();
    let payment_id = "pay_29QQoUBi66xm2f";
    let secret = "gateway-secret";

    let signature = sign(secret, &order_id, payment_id);
    assert!(verify_signature(secret, &order_id, payment_id, &signature));

    // Any single-character change flips the result.
    assert!(!verify_signature(secret, &order_id, "pay_29QQoUBi66xm2g", &signature));
    assert!(!verify_signature("gateway-secreT", &order_id, payment_id, &signature));
    let other_order = upi::generate_order_id();
    assert!(!verify_signature(secret, &other_order, payment_id, &signature));
}

#[test]
fn rejected_inputs_never_reach_the_store() {
    // The handler validates before constructing any record; these are the
    // local rejections.
    for amount in [0.0, -1.0, 100_000.5, f64::NAN] {
        assert!(!upi::is_valid_amount(amount));
    }
    assert!(upi::is_valid_amount(100_000.0));
    assert!(!upi::is_valid_upi("not-a-upi-address"));
}

#[test]
fn deep_link_and_qr_carry_the_order_note() {
    let order_id = "MGK1722930000000-abc123def";
    let link = upi::deep_link(
        upi::PaymentApp::GooglePay,
        "test@ybl",
        "Maa Ka Gullak",
        500.0,
        order_id,
    );
    assert_eq!(
        link,
        "tez://upi/pay?pa=test@ybl&pn=Maa Ka Gullak&am=500&tn=Donation-MGK1722930000000-abc123def&cu=INR"
    );

    let qr = upi::qr_payload("test@ybl", "test@ybl", 500.0, order_id);
    assert!(qr.starts_with("upi://pay?pa=test@ybl&pn=test@ybl&am=500"));
}
