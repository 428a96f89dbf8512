use std::time::Duration;

use hmac::{Hmac, Mac};
use mongodb::Database;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::GatewayConfig;
use crate::db;
use crate::db::models::DonationStatus;

type HmacSha256 = Hmac<Sha256>;

/// Fixed cadence of the status-polling fallback: every five seconds for two
/// minutes, no backoff.
pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const POLL_MAX_ATTEMPTS: u32 = 24;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("gateway request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("gateway rejected order creation: {0}")]
    Gateway(String),
}

#[derive(Serialize)]
struct CreateOrderBody<'a> {
    /// Amount in minor units (paise).
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Thin client for the payment gateway's orders API.
#[derive(Clone)]
pub struct GatewayClient {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Creates a capture-on-payment order for `amount` rupees.
    pub async fn create_order(
        &self,
        amount: f64,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let body = CreateOrderBody {
            amount: (amount * 100.0).round() as i64,
            currency: "INR",
            receipt,
            payment_capture: 1,
        };

        let resp = self
            .http
            .post(format!("{}/orders", self.config.base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp.text().await.unwrap_or_default();
            return Err(PaymentError::Gateway(format!("{}: {}", status, detail)));
        }

        Ok(resp.json().await?)
    }
}

/// Recomputes `HMAC-SHA256(secret, order_id + "|" + payment_id)` and compares
/// it to the hex signature supplied by the payment redirect. The secret never
/// leaves this process; callers must only invoke this server-side.
pub fn verify_signature(secret: &str, order_id: &str, payment_id: &str, signature: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());

    match hex::decode(signature) {
        Ok(supplied) => mac.verify_slice(&supplied).is_ok(),
        Err(_) => false,
    }
}

/// Bounded status poll used when no synchronous callback is available:
/// re-reads the donation on a fixed interval and stops early once it is
/// completed. Gives up silently after the attempt limit; the caller only
/// learns whether completion was observed.
pub async fn poll_donation_completed(db: &Database, donation_id: &str) -> bool {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    for _ in 0..POLL_MAX_ATTEMPTS {
        ticker.tick().await;
        match db::get_donation_status(db, donation_id).await {
            Ok(Some(DonationStatus::Completed)) => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::error!("Status poll read failed for {}: {}", donation_id, e);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(format!("{}|{}", order_id, payment_id).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn accepts_matching_signature() {
        let sig = sign("secret", "order_A1", "pay_B2");
        assert!(verify_signature("secret", "order_A1", "pay_B2", &sig));
    }

    #[test]
    fn any_single_character_change_flips_the_result() {
        let sig = sign("secret", "order_A1", "pay_B2");
        assert!(!verify_signature("secret", "order_A2", "pay_B2", &sig));
        assert!(!verify_signature("secret", "order_A1", "pay_B3", &sig));
        assert!(!verify_signature("zecret", "order_A1", "pay_B2", &sig));

        let mut tampered = sig.clone();
        let last = if tampered.ends_with('0') { '1' } else { '0' };
        tampered.pop();
        tampered.push(last);
        assert!(!verify_signature("secret", "order_A1", "pay_B2", &tampered));
    }

    #[test]
    fn malformed_signature_is_rejected_not_a_panic() {
        assert!(!verify_signature("secret", "o", "p", "not-hex!"));
        assert!(!verify_signature("secret", "o", "p", ""));
    }
}
