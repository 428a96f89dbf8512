use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Highest amount a single donation may carry, in rupees.
pub const MAX_DONATION_AMOUNT: f64 = 100_000.0;

/// Payment apps reachable through a UPI deep link.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentApp {
    PhonePe,
    #[serde(rename = "googlepay")]
    GooglePay,
    Paytm,
}

impl PaymentApp {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentApp::PhonePe => "phonepe",
            PaymentApp::GooglePay => "googlepay",
            PaymentApp::Paytm => "paytm",
        }
    }

    fn scheme(&self) -> &'static str {
        match self {
            PaymentApp::PhonePe => "phonepe://pay",
            PaymentApp::GooglePay => "tez://upi/pay",
            PaymentApp::Paytm => "paytmmp://pay",
        }
    }
}

/// App-specific deep link. The parameter layout is fixed by the receiving
/// apps: payee address (`pa`), payee name (`pn`), amount (`am`), transaction
/// note (`tn`), currency (`cu`).
pub fn deep_link(
    app: PaymentApp,
    payee_address: &str,
    payee_name: &str,
    amount: f64,
    order_id: &str,
) -> String {
    format!(
        "{}?pa={}&pn={}&am={}&tn=Donation-{}&cu=INR",
        app.scheme(),
        payee_address,
        payee_name,
        format_amount(amount),
        order_id
    )
}

/// Generic `upi://` payload rendered as a scannable code when no payment app
/// is detected on the device.
pub fn qr_payload(payee_address: &str, payee_name: &str, amount: f64, order_id: &str) -> String {
    format!(
        "upi://pay?pa={}&pn={}&am={}&tn=Donation-{}&cu=INR",
        payee_address,
        payee_name,
        format_amount(amount),
        order_id
    )
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{}", amount as i64)
    } else {
        format!("{:.2}", amount)
    }
}

/// Client-side order identifier: timestamp plus a short random suffix. Not
/// guaranteed globally unique.
pub fn generate_order_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("MGK{}-{}", Utc::now().timestamp_millis(), &suffix[..9])
}

pub fn is_valid_amount(amount: f64) -> bool {
    amount.is_finite() && amount > 0.0 && amount <= MAX_DONATION_AMOUNT
}

/// Basic UPI address check: alphanumeric, dots and hyphens around a single
/// `@`.
pub fn is_valid_upi(address: &str) -> bool {
    let re = Regex::new(r"^[\w.-]+@[\w.-]+$").expect("upi pattern");
    re.is_match(address)
}

/// Heuristic used to decide whether to deep-link into a payment app or fall
/// back to the scannable code.
pub fn is_mobile_user_agent(user_agent: &str) -> bool {
    let re = Regex::new(r"(?i)Android|iPhone|iPad|iPod").expect("user agent pattern");
    re.is_match(user_agent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_matches_expected_shape() {
        let re = Regex::new(r"^MGK\d+-[a-z0-9]{9}$").expect("pattern");
        for _ in 0..32 {
            let id = generate_order_id();
            assert!(re.is_match(&id), "unexpected order id: {}", id);
        }
    }

    #[test]
    fn amount_bounds() {
        assert!(is_valid_amount(1.0));
        assert!(is_valid_amount(500.0));
        assert!(is_valid_amount(100_000.0));
        assert!(!is_valid_amount(0.0));
        assert!(!is_valid_amount(-5.0));
        assert!(!is_valid_amount(100_000.01));
        assert!(!is_valid_amount(f64::NAN));
        assert!(!is_valid_amount(f64::INFINITY));
    }

    #[test]
    fn upi_address_shape() {
        assert!(is_valid_upi("test@ybl"));
        assert!(is_valid_upi("first.last-1@ok-axis"));
        assert!(!is_valid_upi("no-at-sign"));
        assert!(!is_valid_upi("two@@signs"));
        assert!(!is_valid_upi("spaces in@upi"));
    }

    #[test]
    fn deep_links_preserve_app_templates() {
        let link = deep_link(PaymentApp::PhonePe, "9335837383@ybl", "Maa Ka Gullak", 500.0, "MGK1-abcdefghi");
        assert_eq!(
            link,
            "phonepe://pay?pa=9335837383@ybl&pn=Maa Ka Gullak&am=500&tn=Donation-MGK1-abcdefghi&cu=INR"
        );

        let link = deep_link(PaymentApp::GooglePay, "a@b", "P", 12.5, "MGK2-abcdefghi");
        assert!(link.starts_with("tez://upi/pay?pa=a@b&pn=P&am=12.50&tn=Donation-MGK2-abcdefghi"));

        let link = deep_link(PaymentApp::Paytm, "a@b", "P", 10.0, "MGK3-abcdefghi");
        assert!(link.starts_with("paytmmp://pay?"));

        let qr = qr_payload("a@b", "P", 10.0, "MGK4-abcdefghi");
        assert!(qr.starts_with("upi://pay?pa=a@b"));
        assert!(qr.ends_with("&cu=INR"));
    }

    #[test]
    fn mobile_user_agent_heuristic() {
        assert!(is_mobile_user_agent(
            "Mozilla/5.0 (Linux; Android 14) AppleWebKit/537.36"
        ));
        assert!(is_mobile_user_agent("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0)"));
        assert!(!is_mobile_user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0"
        ));
    }
}
