use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::api::{
    CaptureRequest, CaptureTicketResponse, DenyRequest, JobSummary, MissionView, SubmitReceipt,
};
use crate::models::evidence::StillImage;
use crate::routes::{ApiError, CurrentSession};

/// GET /api/v1/gigs: Missions open to this worker.
pub async fn list_gigs(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<Vec<JobSummary>>, ApiError> {
    Ok(Json(state.workbench.available_jobs(sid).await?))
}

/// POST /api/v1/gigs/{job_id}/start: Accept a mission.
pub async fn start_gig(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Path(job_id): Path<String>,
) -> Result<Json<MissionView>, ApiError> {
    Ok(Json(state.workbench.start_job(sid, &job_id).await?))
}

/// GET /api/v1/mission: The selected mission, or null.
pub async fn current_mission(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<Option<MissionView>>, ApiError> {
    Ok(Json(state.workbench.mission(sid).await?))
}

/// POST /api/v1/mission/captures: Open the camera for a slot, the
/// registration card, or a defect scan.
pub async fn open_capture(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Json(request): Json<CaptureRequest>,
) -> Result<(StatusCode, Json<CaptureTicketResponse>), ApiError> {
    let ticket = state.workbench.begin_capture(sid, request.target).await?;
    Ok((StatusCode::CREATED, Json(ticket)))
}

/// POST /api/v1/mission/captures/{ticket_id}/frame: Shutter: upload the
/// still as an `image` file part or a `data_url` text part.
pub async fn upload_frame(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Path(ticket_id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<StatusCode, ApiError> {
    let mut image: Option<StillImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        let parsed = match name.as_deref() {
            Some("image") => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
                StillImage::from_bytes(data.to_vec())
            }
            Some("data_url") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, e.to_string()))?;
                StillImage::from_data_url(&text)
            }
            _ => continue,
        };
        image = Some(
            parsed.map_err(|e| ApiError::new(StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string()))?,
        );
    }

    let image = image.ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "Missing image part"))?;
    state.workbench.deliver_frame(sid, ticket_id, image).await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/mission/captures/{ticket_id}/cancel: Camera closed without a shot.
pub async fn cancel_capture(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Path(ticket_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.workbench.cancel_capture(sid, ticket_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/mission/captures/{ticket_id}/deny: The device refused camera access.
pub async fn deny_capture(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Path(ticket_id): Path<Uuid>,
    request: Option<Json<DenyRequest>>,
) -> Result<StatusCode, ApiError> {
    let reason = request
        .and_then(|Json(r)| r.reason)
        .unwrap_or_else(|| "Camera access denied".to_string());
    state.workbench.deny_capture(sid, ticket_id, reason).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/mission/submit: Finalize the mission and collect the reward.
pub async fn submit_mission(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<SubmitReceipt>, ApiError> {
    Ok(Json(state.workbench.submit(sid).await?))
}
