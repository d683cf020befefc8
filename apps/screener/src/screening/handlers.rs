//! Axum route handlers for the Screening API.

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Serialize;
use uuid::Uuid;

use crate::document::archive::read_archive;
use crate::document::JobDescription;
use crate::errors::AppError;
use crate::screening::models::{BatchResult, DroppedDocument, HookFailure};
use crate::screening::store::{ScreeningSnapshot, ScreeningStatus};
use crate::state::AppState;

const JOB_DESCRIPTION_FIELD: &str = "job_description";
const ARCHIVE_FIELD: &str = "archive";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct CreateScreeningResponse {
    pub screening_id: Uuid,
    pub total_documents: usize,
}

#[derive(Debug, Serialize)]
pub struct ShortlistEntry {
    pub document: String,
    pub candidate_name: String,
    pub match_percentage: u32,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct ScreeningSummary {
    pub total_documents: usize,
    pub evaluated: usize,
    pub total_shortlisted: usize,
    pub shortlisted: Vec<ShortlistEntry>,
    pub dropped: Vec<DroppedDocument>,
    pub hook_failures: Vec<HookFailure>,
}

#[derive(Debug, Serialize)]
pub struct ScreeningStatusResponse {
    pub screening_id: Uuid,
    pub status: ScreeningStatus,
    pub completed: usize,
    pub total: usize,
    pub progress_percent: u8,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<ScreeningSummary>,
}

impl ScreeningStatusResponse {
    fn from_snapshot(snapshot: ScreeningSnapshot) -> Self {
        let summary = snapshot
            .result
            .as_deref()
            .map(|result| summarize(snapshot.id, result));
        Self {
            screening_id: snapshot.id,
            status: snapshot.status,
            completed: snapshot.completed,
            total: snapshot.total,
            progress_percent: snapshot.progress_percent(),
            created_at: snapshot.created_at,
            finished_at: snapshot.finished_at,
            summary,
        }
    }
}

fn summarize(id: Uuid, result: &BatchResult) -> ScreeningSummary {
    let shortlisted: Vec<_> = result
        .shortlist()
        .map(|o| ShortlistEntry {
            document: o.document.name().to_string(),
            candidate_name: o.record.name.clone(),
            match_percentage: o.record.match_percentage,
            download_url: download_url(id, o.document.name()),
        })
        .collect();

    ScreeningSummary {
        total_documents: result.total_documents,
        evaluated: result.evaluated(),
        total_shortlisted: shortlisted.len(),
        shortlisted,
        dropped: result.drops.clone(),
        hook_failures: result.hook_failures.clone(),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/screenings
///
/// Multipart upload: `job_description` text plus an `archive` ZIP of PDF resumes.
/// The archive is opened up front so a broken upload fails before anything runs;
/// the batch itself continues in the background.
pub async fn handle_create_screening(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreateScreeningResponse>), AppError> {
    let mut job_description: Option<String> = None;
    let mut archive: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        match field.name() {
            Some(JOB_DESCRIPTION_FIELD) => {
                job_description = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Unreadable {JOB_DESCRIPTION_FIELD}: {e}"))
                })?);
            }
            Some(ARCHIVE_FIELD) => {
                archive = Some(field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Unreadable {ARCHIVE_FIELD}: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let job = job_description
        .as_deref()
        .and_then(JobDescription::new)
        .ok_or_else(|| AppError::Validation("job_description cannot be empty".to_string()))?;
    let archive =
        archive.ok_or_else(|| AppError::Validation("archive file is required".to_string()))?;

    let documents = tokio::task::spawn_blocking(move || read_archive(&archive))
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Archive reader crashed: {e}")))??;
    let total_documents = documents.len();

    let screening_id = state
        .screenings
        .start(state.pipeline.clone(), job, documents)
        .await;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateScreeningResponse {
            screening_id,
            total_documents,
        }),
    ))
}

/// GET /api/v1/screenings/:id
pub async fn handle_get_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ScreeningStatusResponse>, AppError> {
    let snapshot = state
        .screenings
        .snapshot(id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Screening {id} not found")))?;
    Ok(Json(ScreeningStatusResponse::from_snapshot(snapshot)))
}

/// DELETE /api/v1/screenings/:id
///
/// Cooperative: documents already recorded stay in the result.
pub async fn handle_cancel_screening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if state.screenings.cancel(id).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(AppError::NotFound(format!("Screening {id} not found")))
    }
}

/// GET /api/v1/screenings/:id/documents/*name
///
/// Original bytes of a shortlisted resume.
pub async fn handle_download_document(
    State(state): State<AppState>,
    Path((id, name)): Path<(Uuid, String)>,
) -> Result<Response, AppError> {
    let (bytes, match_percentage) = state
        .screenings
        .shortlisted_document(id, &name)
        .await
        .ok_or_else(|| AppError::NotFound(format!("No shortlisted document '{name}'")))?;

    let headers = [
        (header::CONTENT_TYPE, "application/pdf".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", attachment_name(&name)),
        ),
        (
            HeaderName::from_static("x-match-percentage"),
            match_percentage.to_string(),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// Download path of a shortlisted document. Archive entry names may contain
/// `#`, `?` or spaces, so every segment is percent-encoded.
fn download_url(id: Uuid, document: &str) -> String {
    let path = format!("/api/v1/screenings/{id}/documents");
    let Ok(mut url) = Url::parse(&format!("http://localhost{path}")) else {
        return format!("{path}/{document}");
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.extend(document.split('/'));
    }
    url.path().to_string()
}

/// Base file name, restricted to characters that are safe in a header value.
fn attachment_name(name: &str) -> String {
    name.rsplit('/')
        .next()
        .unwrap_or(name)
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() || c == ' ') && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
