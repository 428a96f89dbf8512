use chrono::Utc;

use lifther_server::db::models::{
    aggregate_status, DocumentType, VerificationDocument, VerificationStatus,
};

fn submitted(doc_type: DocumentType) -> VerificationDocument {
    VerificationDocument {
        doc_type,
        document_number: "X1234567".to_string(),
        front_image_url: "https://cdn.example/verification/u1/front.jpg".to_string(),
        back_image_url: Some("https://cdn.example/verification/u1/back.jpg".to_string()),
        selfie_with_document: None,
        uploaded_at: Utc::now(),
        verified_at: None,
        status: VerificationStatus::Pending,
        rejection_reason: None,
    }
}

#[test]
fn record_walks_pending_review_verified() {
    let mut docs = vec![submitted(DocumentType::Aadhar), submitted(DocumentType::Pan)];
    assert_eq!(aggregate_status(&docs), VerificationStatus::Pending);

    // First decision moves the record into review.
    docs[0].status = VerificationStatus::Verified;
    assert_eq!(aggregate_status(&docs), VerificationStatus::InReview);

    // The last pending decision completes it.
    docs[1].status = VerificationStatus::Verified;
    assert_eq!(aggregate_status(&docs), VerificationStatus::Verified);
}

#[test]
fn rejection_blocks_verified_without_collapsing_the_record() {
    let mut docs = vec![submitted(DocumentType::Aadhar), submitted(DocumentType::Pan)];
    docs[0].status = VerificationStatus::Verified;
    docs[1].status = VerificationStatus::Rejected;

    let aggregate = aggregate_status(&docs);
    assert_ne!(aggregate, VerificationStatus::Verified);
    assert_eq!(aggregate, VerificationStatus::InReview);
}

#[test]
fn document_wire_format_matches_store_layout() {
    let mut doc = submitted(DocumentType::DrivingLicense);
    doc.status = VerificationStatus::Rejected;
    doc.rejection_reason = Some("Image unreadable".to_string());

    let wire = serde_json::to_value(&doc).expect("serialize");
    assert_eq!(wire["type"], serde_json::json!("driving_license"));
    assert_eq!(wire["status"], serde_json::json!("rejected"));
    assert!(wire.get("documentNumber").is_some());
    assert!(wire.get("frontImageUrl").is_some());
    assert!(wire.get("backImageUrl").is_some());
    assert!(wire.get("rejectionReason").is_some());
    // Absent optionals stay off the document entirely.
    assert!(wire.get("selfieWithDocument").is_none());
}
