//! Receipt handlers
//!
//! Both endpoints take a multipart form with a single `file` field. The
//! file type is decided by its leading bytes, never by the client's
//! content type.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    Extension, Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::info;

use crate::{AppError, AppState, CurrentUser, MAX_UPLOAD_SIZE};
use tally_core::models::ExtractionDraft;
use tally_core::receipt::{normalizer, FileKind};

/// Read the `file` field of a multipart upload
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    let too_large = || {
        AppError::bad_request(&format!(
            "File too large. Maximum size is {} MB",
            MAX_UPLOAD_SIZE / 1024 / 1024
        ))
    };

    let mut file_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| too_large())?
    {
        if field.name() != Some("file") {
            continue;
        }

        let bytes = field.bytes().await.map_err(|_| too_large())?;
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(too_large());
        }
        file_data = Some(bytes.to_vec());
    }

    match file_data {
        Some(data) if !data.is_empty() => Ok(data),
        Some(_) => Err(AppError::bad_request("Uploaded file is empty")),
        None => Err(AppError::bad_request("Missing file field")),
    }
}

/// POST /api/scan-receipt - Extract a reviewable draft from a receipt
///
/// The draft is not saved; the client posts the reviewed version to
/// `/api/expenses`.
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ExtractionDraft>, AppError> {
    let upload = read_upload(&mut multipart).await?;
    let kind = FileKind::sniff(&upload);

    let draft = state
        .scanner
        .scan(&upload, Utc::now().date_naive())
        .await
        .map_err(AppError::extraction)?;

    state.db.log_audit(
        &user.email,
        "scan",
        Some("receipt"),
        None,
        Some(&format!(
            "type={}, bytes={}, confidence={:.2}",
            kind.label(),
            upload.len(),
            draft.confidence_score
        )),
    )?;

    Ok(Json(draft))
}

#[derive(Debug, Serialize)]
pub struct ImageUploadResponse {
    /// `data:` URI suitable for `receipt_image`
    pub image_data: String,
    pub content_type: &'static str,
}

/// POST /api/upload-receipt-image - Wrap a receipt file as an embeddable data URI
pub async fn upload_receipt_image(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ImageUploadResponse>, AppError> {
    let upload = read_upload(&mut multipart).await?;

    let kind = FileKind::sniff(&upload);
    let Some(mime) = kind.mime() else {
        return Err(AppError::unsupported_media_type(
            "Unsupported file type. Upload a PNG, JPEG, WEBP or PDF file.",
        ));
    };

    info!(user = %user.email, kind = kind.label(), bytes = upload.len(), "Receipt image uploaded");

    Ok(Json(ImageUploadResponse {
        image_data: normalizer::data_uri(mime, &upload),
        content_type: mime,
    }))
}
