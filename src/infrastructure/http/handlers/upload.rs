//! Upload HTTP Handler
//!
//! 桌面客户端以 multipart 上传音频：`audioFile`（必填）、`destinationId`、`title`、`submitterId`

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, Multipart, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::application::UploadAudio;
use crate::infrastructure::http::dto::{parse_destination, ApiResponse, UploadAck};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

const FIELD_AUDIO: &str = "audioFile";
const FIELD_DESTINATION: &str = "destinationId";
const FIELD_TITLE: &str = "title";
const FIELD_SUBMITTER: &str = "submitterId";

#[derive(Default)]
struct UploadForm {
    destination_id: Option<String>,
    title: Option<String>,
    submitter_id: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Option<Bytes>,
}

/// 上传音频并入队
pub async fn upload_audio(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<ApiResponse<UploadAck>>), ApiError> {
    let mut multipart = multipart
        .map_err(|e| ApiError::BadRequest(format!("Expected multipart/form-data: {}", e)))?;

    let form = read_form(&mut multipart, state.options.max_upload_size).await?;

    let data = form
        .data
        .ok_or_else(|| ApiError::BadRequest(format!("Field '{}' is required", FIELD_AUDIO)))?;

    let destination_id = match form.destination_id.filter(|d| !d.trim().is_empty()) {
        Some(raw) => parse_destination(&raw)?,
        None => state.options.default_destination.clone().ok_or_else(|| {
            ApiError::BadRequest(format!(
                "Field '{}' is required (no default destination configured)",
                FIELD_DESTINATION
            ))
        })?,
    };

    let command = UploadAudio {
        destination_id,
        submitter_id: form.submitter_id,
        title: form.title,
        file_name: form.file_name,
        content_type: form.content_type,
        data,
    };

    let receipt = state.upload_audio_handler.handle(command).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(UploadAck::from(receipt))),
    ))
}

async fn read_form(multipart: &mut Multipart, max_upload_size: u64) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError::BadRequest(format!("Failed to read multipart field: {}", e))
    })? {
        let field_name = field.name().unwrap_or_default().to_string();

        match field_name.as_str() {
            FIELD_AUDIO => {
                form.file_name = field.file_name().map(|s| s.to_string());
                form.content_type = field.content_type().map(|s| s.to_string());

                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read audio file: {}", e))
                })?;
                if bytes.len() as u64 > max_upload_size {
                    return Err(ApiError::BadRequest(format!(
                        "Audio file exceeds {} bytes",
                        max_upload_size
                    )));
                }
                form.data = Some(bytes);
            }
            FIELD_DESTINATION => form.destination_id = Some(read_text(field).await?),
            FIELD_TITLE => form.title = Some(read_text(field).await?),
            FIELD_SUBMITTER => form.submitter_id = Some(read_text(field).await?),
            _ => {}
        }
    }

    Ok(form)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    let name = field.name().unwrap_or_default().to_string();
    field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))
}
