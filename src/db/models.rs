use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a donation. Only moves forward: pending -> completed or
/// pending -> failed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DonationStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Donation {
    #[serde(rename = "_id")]
    pub id: String,
    pub donor_id: String,
    pub donor_name: String,
    pub amount: f64,
    pub message: Option<String>,
    pub is_anonymous: bool,
    pub status: DonationStatus,
    pub payment_method: String,
    pub order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(rename = "recipientUPI")]
    pub recipient_upi: String,
    pub recipient_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecentDonation {
    pub id: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-user running donation totals, keyed by user id. Updated alongside
/// Donation creation as a second, non-transactional write, so it can drift
/// from the sum of the user's donations if one write fails.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserDonationStats {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub total_donations: f64,
    pub donation_count: i64,
    pub recent_donations: Vec<RecentDonation>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Donor,
    Recipient,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_status: Option<VerificationStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    #[serde(rename = "_id")]
    pub user_id: String,
    pub is_anonymous_donation: bool,
    pub email_notifications: bool,
}

impl UserSettings {
    pub fn default_for(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            is_anonymous_donation: false,
            email_notifications: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProfileStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct RecipientProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub email: String,
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
    pub accepted_terms: bool,
    pub status: ProfileStatus,
    pub total_received: f64,
    pub is_verified: bool,
    pub kyc_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    InReview,
    Verified,
    Rejected,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhar,
    Pan,
    VoterId,
    DrivingLicense,
}

impl DocumentType {
    /// Stable name used in object-storage keys.
    pub fn key_name(&self) -> &'static str {
        match self {
            DocumentType::Aadhar => "aadhar",
            DocumentType::Pan => "pan",
            DocumentType::VoterId => "voter_id",
            DocumentType::DrivingLicense => "driving_license",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationDocument {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub document_number: String,
    pub front_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub back_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selfie_with_document: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
    pub status: VerificationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PersonalInfo {
    pub full_name: String,
    pub date_of_birth: String,
    pub address: String,
    pub phone: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_number: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub account_holder_name: String,
    pub verified: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub status: VerificationStatus,
    pub documents: Vec<VerificationDocument>,
    pub personal_info: PersonalInfo,
    pub bank_details: BankDetails,
    #[serde(default)]
    pub moderator_notes: Vec<String>,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Aggregate status is a pure function of the per-document statuses:
/// `verified` iff every document is verified, otherwise `in_review` once any
/// decision has been made, else `pending`. A rejected document blocks
/// `verified` but does not collapse the aggregate to `rejected`.
pub fn aggregate_status(documents: &[VerificationDocument]) -> VerificationStatus {
    if !documents.is_empty()
        && documents
            .iter()
            .all(|d| d.status == VerificationStatus::Verified)
    {
        return VerificationStatus::Verified;
    }
    let any_decided = documents
        .iter()
        .any(|d| d.status != VerificationStatus::Pending);
    if any_decided {
        VerificationStatus::InReview
    } else {
        VerificationStatus::Pending
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub category: String,
    pub story: String,
    /// Public URL of the uploaded image, empty when none was provided.
    pub image: String,
    pub user_id: String,
    pub date: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(status: VerificationStatus) -> VerificationDocument {
        VerificationDocument {
            doc_type: DocumentType::Aadhar,
            document_number: "1234-5678-9012".to_string(),
            front_image_url: "https://cdn.example/front.jpg".to_string(),
            back_image_url: None,
            selfie_with_document: None,
            uploaded_at: Utc::now(),
            verified_at: None,
            status,
            rejection_reason: None,
        }
    }

    #[test]
    fn aggregate_is_pending_without_decisions() {
        let docs = vec![doc(VerificationStatus::Pending), doc(VerificationStatus::Pending)];
        assert_eq!(aggregate_status(&docs), VerificationStatus::Pending);
    }

    #[test]
    fn aggregate_is_verified_only_when_every_document_is() {
        let mut docs = vec![doc(VerificationStatus::Verified), doc(VerificationStatus::Verified)];
        assert_eq!(aggregate_status(&docs), VerificationStatus::Verified);

        docs[1].status = VerificationStatus::Pending;
        assert_eq!(aggregate_status(&docs), VerificationStatus::InReview);

        docs[1].status = VerificationStatus::Rejected;
        assert_eq!(aggregate_status(&docs), VerificationStatus::InReview);
    }

    #[test]
    fn aggregate_moves_off_verified_when_any_document_changes() {
        for flipped in [VerificationStatus::Pending, VerificationStatus::Rejected] {
            let mut docs = vec![
                doc(VerificationStatus::Verified),
                doc(VerificationStatus::Verified),
                doc(VerificationStatus::Verified),
            ];
            docs[2].status = flipped;
            assert_ne!(aggregate_status(&docs), VerificationStatus::Verified);
        }
    }

    #[test]
    fn aggregate_of_empty_document_list_is_pending() {
        assert_eq!(aggregate_status(&[]), VerificationStatus::Pending);
    }

    #[test]
    fn wire_names_match_store_layout() {
        let stats = UserDonationStats {
            user_id: "u1".to_string(),
            total_donations: 500.0,
            donation_count: 1,
            recent_donations: vec![],
        };
        let value = serde_json::to_value(&stats).expect("serialize");
        assert!(value.get("totalDonations").is_some());
        assert!(value.get("donationCount").is_some());
        assert!(value.get("recentDonations").is_some());

        let v = serde_json::to_value(VerificationStatus::InReview).expect("serialize");
        assert_eq!(v, serde_json::json!("in_review"));
        let v = serde_json::to_value(DocumentType::DrivingLicense).expect("serialize");
        assert_eq!(v, serde_json::json!("driving_license"));
    }
}
