use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Json as AxumJson},
};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthenticatedUser;
use crate::db;
use crate::db::models::{
    aggregate_status, BankDetails, DocumentType, PersonalInfo, VerificationDocument,
    VerificationRecord, VerificationStatus,
};
use crate::storage;
use crate::AppState;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocumentSide {
    Front,
    Back,
    Selfie,
}

impl DocumentSide {
    fn key_name(&self) -> &'static str {
        match self {
            DocumentSide::Front => "front",
            DocumentSide::Back => "back",
            DocumentSide::Selfie => "selfie",
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    pub file_type: String,
    pub document_type: DocumentType,
    pub side: DocumentSide,
}

/// Presigned upload slot for one document image. The object key is derived
/// from the user id and document type/side, so re-uploads overwrite.
pub async fn upload_url(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UploadUrlRequest>,
) -> impl IntoResponse {
    let Some(ext) = storage::extension_for(&req.file_type) else {
        return (StatusCode::BAD_REQUEST, "Unsupported file type").into_response();
    };

    let key = format!(
        "verification/{}/{}_{}.{}",
        user.id,
        req.document_type.key_name(),
        req.side.key_name(),
        ext
    );

    match state
        .storage
        .presign_write(&key, storage::UPLOAD_URL_TTL)
        .await
    {
        Ok(presigned) => AxumJson(json!({
            "uploadUrl": presigned.uri().to_string(),
            "key": key,
            "publicUrl": storage::object_url(&state.config.storage, &key),
            "expiresIn": storage::UPLOAD_URL_TTL.as_secs(),
        }))
        .into_response(),
        Err(e) => {
            tracing::error!("Storage Presign Error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Storage Error").into_response()
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedDocument {
    #[serde(rename = "type")]
    pub doc_type: DocumentType,
    pub document_number: String,
    pub front_image_url: String,
    pub back_image_url: Option<String>,
    pub selfie_with_document: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedBankDetails {
    pub account_number: String,
    pub ifsc_code: String,
    pub bank_name: String,
    pub account_holder_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationRequest {
    pub documents: Vec<SubmittedDocument>,
    pub personal_info: PersonalInfo,
    pub bank_details: SubmittedBankDetails,
}

/// Submits the verification record. Images were uploaded beforehand; the
/// record carries only their URLs.
pub async fn submit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<SubmitVerificationRequest>,
) -> impl IntoResponse {
    if req.documents.is_empty() {
        return (StatusCode::BAD_REQUEST, "At least one document is required").into_response();
    }

    let now = chrono::Utc::now();
    let record = VerificationRecord {
        id: user.id.clone(),
        user_id: user.id.clone(),
        status: VerificationStatus::Pending,
        documents: req
            .documents
            .into_iter()
            .map(|d| VerificationDocument {
                doc_type: d.doc_type,
                document_number: d.document_number,
                front_image_url: d.front_image_url,
                back_image_url: d.back_image_url,
                selfie_with_document: d.selfie_with_document,
                uploaded_at: now,
                verified_at: None,
                status: VerificationStatus::Pending,
                rejection_reason: None,
            })
            .collect(),
        personal_info: req.personal_info,
        bank_details: BankDetails {
            account_number: req.bank_details.account_number,
            ifsc_code: req.bank_details.ifsc_code,
            bank_name: req.bank_details.bank_name,
            account_holder_name: req.bank_details.account_holder_name,
            verified: false,
        },
        moderator_notes: Vec::new(),
        last_updated: now,
        created_at: now,
    };

    if let Err(e) = db::put_verification(&state.db, &record).await {
        tracing::error!("Verification write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    if let Err(e) =
        db::set_role_verification_status(&state.db, &user.id, VerificationStatus::Pending).await
    {
        tracing::error!("Role status update failed: {}", e);
    }

    (StatusCode::CREATED, AxumJson(record)).into_response()
}

pub async fn status(State(state): State<AppState>, user: AuthenticatedUser) -> impl IntoResponse {
    match db::get_verification(&state.db, &user.id).await {
        Ok(Some(record)) => AxumJson(record).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "Verification record not found").into_response(),
        Err(e) => {
            tracing::error!("Verification lookup failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response()
        }
    }
}

fn require_moderator(state: &AppState, user: &AuthenticatedUser) -> Result<(), StatusCode> {
    if state.config.moderator_ids.iter().any(|id| id == &user.id) {
        Ok(())
    } else {
        Err(StatusCode::FORBIDDEN)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionRequest {
    pub user_id: String,
    pub document_type: DocumentType,
    pub verified: bool,
    pub rejection_reason: Option<String>,
}

/// Moderator decision on one document: update the entry, recompute the
/// aggregate, and propagate a fully verified record onto the role document.
pub async fn decide_document(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<DecisionRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_moderator(&state, &user) {
        return (status, "Moderator access required").into_response();
    }

    let mut record = match db::get_verification(&state.db, &req.user_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Verification record not found").into_response()
        }
        Err(e) => {
            tracing::error!("Verification lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    let Some(entry) = record
        .documents
        .iter_mut()
        .find(|d| d.doc_type == req.document_type)
    else {
        return (StatusCode::NOT_FOUND, "Document not found").into_response();
    };

    let now = chrono::Utc::now();
    entry.status = if req.verified {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Rejected
    };
    entry.verified_at = Some(now);
    entry.rejection_reason = req.rejection_reason;

    record.status = aggregate_status(&record.documents);
    record.last_updated = now;

    if let Err(e) = db::put_verification(&state.db, &record).await {
        tracing::error!("Verification write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    if record.status == VerificationStatus::Verified {
        if let Err(e) =
            db::set_role_verification_status(&state.db, &req.user_id, VerificationStatus::Verified)
                .await
        {
            tracing::error!("Role status update failed: {}", e);
        }
    }

    AxumJson(record).into_response()
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDecisionRequest {
    pub user_id: String,
    pub verified: bool,
    pub note: Option<String>,
}

pub async fn decide_bank(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<BankDecisionRequest>,
) -> impl IntoResponse {
    if let Err(status) = require_moderator(&state, &user) {
        return (status, "Moderator access required").into_response();
    }

    let mut record = match db::get_verification(&state.db, &req.user_id).await {
        Ok(Some(r)) => r,
        Ok(None) => {
            return (StatusCode::NOT_FOUND, "Verification record not found").into_response()
        }
        Err(e) => {
            tracing::error!("Verification lookup failed: {}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
        }
    };

    record.bank_details.verified = req.verified;
    if let Some(note) = req.note {
        if !note.trim().is_empty() {
            record.moderator_notes.push(note);
        }
    }
    record.last_updated = chrono::Utc::now();

    if let Err(e) = db::put_verification(&state.db, &record).await {
        tracing::error!("Verification write failed: {}", e);
        return (StatusCode::INTERNAL_SERVER_ERROR, "Database Error").into_response();
    }

    AxumJson(record).into_response()
}
