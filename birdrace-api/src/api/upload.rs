//! eBird CSV upload endpoint

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use axum::extract::multipart::MultipartError;
use serde::Serialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::import::{import_file, ImportStats};
use crate::{ApiError, ApiResult, AppState};

/// Multipart framing allowance on top of the file size ceiling
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub stats: ImportStats,
}

fn too_large(max_bytes: usize) -> ApiError {
    ApiError::PayloadTooLarge(format!(
        "File size exceeds maximum of {} MB",
        max_bytes / (1024 * 1024)
    ))
}

fn multipart_error(err: MultipartError, max_bytes: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        too_large(max_bytes)
    } else {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    }
}

/// POST /upload/csv
///
/// Multipart form with a `file` field holding an eBird export. Only rows
/// dated within the configured competition year are imported.
pub async fn upload_csv(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let max_bytes = state.config.max_upload_bytes;
    let mut contents = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or_default().to_string();
        if !file_name.to_ascii_lowercase().ends_with(".csv") {
            return Err(ApiError::BadRequest("File must be a CSV file".to_string()));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;
        contents = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        contents.ok_or_else(|| ApiError::BadRequest("Missing 'file' field".to_string()))?;

    if bytes.len() > max_bytes {
        return Err(too_large(max_bytes));
    }

    info!(
        "Processing upload {} ({} bytes) for user {}",
        file_name,
        bytes.len(),
        user.id
    );

    let stats = import_file(&state.db, &bytes, user.id, state.config.target_year).await?;

    Ok(Json(UploadResponse {
        message: "CSV processed successfully".to_string(),
        stats,
    }))
}

/// Build upload routes with a body limit sized for `max_upload_bytes`
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/upload/csv", post(upload_csv))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_add(MULTIPART_OVERHEAD),
        ))
}
