//! Waiver API routes

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::db::{WaiverRecord, WaiverRepository};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::storage::{waiver_key, WaiverKind};
use crate::waivers::{Participant, SignOutcome, SigningService};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:event_id/waivers", get(list_waivers))
        .route("/:event_id/waivers/templates", post(upload_template))
        .route("/:event_id/waivers/:template_id/sign", post(sign_waiver))
        .layer(DefaultBodyLimit::max(25 * 1024 * 1024))
}

async fn list_waivers(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<WaiverRecord>>> {
    let repo = WaiverRepository::new(state.db());
    let records = repo.list_for_event(&event_id).await?;
    Ok(Json(records))
}

#[derive(Serialize)]
struct TemplateUploadResponse {
    id: String,
    storage_key: String,
}

/// Upload a template waiver PDF for an event
async fn upload_template(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<TemplateUploadResponse>> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut guardian_id: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "waiver.pdf".to_string());
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read file: {}", e)))?;
                file = Some((file_name, data.to_vec()));
            }
            "guardian_id" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read field: {}", e)))?;
                guardian_id = Some(value);
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field '{}'", other);
            }
        }
    }

    let (file_name, data) =
        file.ok_or_else(|| AppError::BadRequest("No file provided. Use field name 'file'".to_string()))?;
    let guardian_id =
        guardian_id.ok_or_else(|| AppError::BadRequest("Missing guardian_id field".to_string()))?;

    // Reject uploads the scanner can't read before storing anything
    lopdf::Document::load_mem(&data)?;

    let key = waiver_key(WaiverKind::Template, &event_id, &guardian_id, &file_name);
    state.store().put(&key, data, "application/pdf").await?;

    let repo = WaiverRepository::new(state.db());
    let record = repo
        .create_template(&event_id, &guardian_id, &key, &file_name)
        .await?;

    tracing::info!("Template waiver {} uploaded for event {}", record.id, event_id);

    Ok(Json(TemplateUploadResponse {
        id: record.id,
        storage_key: record.storage_key,
    }))
}

/// Sign a waiver for a batch of participants
async fn sign_waiver(
    State(state): State<AppState>,
    Path((event_id, template_id)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<SignOutcome>> {
    let mut signature: Option<Vec<u8>> = None;
    let mut guardian_id: Option<String> = None;
    let mut guardian_name: Option<String> = None;
    let mut participants: Option<Vec<Participant>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "signature" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(format!("Failed to read signature: {}", e)))?;
                signature = Some(data.to_vec());
            }
            "guardian_id" => {
                guardian_id = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field: {}", e))
                })?);
            }
            "guardian_name" => {
                guardian_name = Some(field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field: {}", e))
                })?);
            }
            "participants" => {
                let raw = field.text().await.map_err(|e| {
                    AppError::BadRequest(format!("Failed to read field: {}", e))
                })?;
                let parsed: Vec<Participant> = serde_json::from_str(&raw).map_err(|e| {
                    AppError::BadRequest(format!("Invalid participants JSON: {}", e))
                })?;
                participants = Some(parsed);
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field '{}'", other);
            }
        }
    }

    let signature =
        signature.ok_or_else(|| AppError::BadRequest("Missing signature image".to_string()))?;
    let guardian_id =
        guardian_id.ok_or_else(|| AppError::BadRequest("Missing guardian_id field".to_string()))?;
    let guardian_name = guardian_name
        .ok_or_else(|| AppError::BadRequest("Missing guardian_name field".to_string()))?;
    let participants = participants
        .ok_or_else(|| AppError::BadRequest("Missing participants field".to_string()))?;

    let calibration = &state.config().waiver.calibration;
    let service = SigningService::new(state.db(), state.store(), calibration);
    let outcome = service
        .sign(
            &event_id,
            &template_id,
            &guardian_id,
            &guardian_name,
            &signature,
            &participants,
        )
        .await?;

    Ok(Json(outcome))
}
