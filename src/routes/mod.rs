use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::services::camera::CaptureError;
use crate::services::lifecycle::{LifecycleError, SubmitRejection};
use crate::services::workbench::WorkbenchError;

pub mod auth;
pub mod health;
pub mod metrics;
pub mod mission;
pub mod wallet;

/// API routes under `/api/v1` plus `/health`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/auth/signup", post(auth::sign_up))
        .route("/api/v1/auth/login", post(auth::log_in))
        .route(
            "/api/v1/auth/passkey/registration",
            get(auth::passkey_registration_options),
        )
        .route(
            "/api/v1/auth/passkey/assertion",
            get(auth::passkey_assertion_options),
        )
        .route("/api/v1/auth/passkey", post(auth::log_in_with_passkey))
        .route("/api/v1/auth/logout", post(auth::log_out))
        .route("/api/v1/session", get(auth::session))
        .route(
            "/api/v1/session/wellness/dismiss",
            post(auth::dismiss_wellness),
        )
        .route("/api/v1/gigs", get(mission::list_gigs))
        .route("/api/v1/gigs/{job_id}/start", post(mission::start_gig))
        .route("/api/v1/mission", get(mission::current_mission))
        .route("/api/v1/mission/captures", post(mission::open_capture))
        .route(
            "/api/v1/mission/captures/{ticket_id}/frame",
            post(mission::upload_frame),
        )
        .route(
            "/api/v1/mission/captures/{ticket_id}/cancel",
            post(mission::cancel_capture),
        )
        .route(
            "/api/v1/mission/captures/{ticket_id}/deny",
            post(mission::deny_capture),
        )
        .route("/api/v1/mission/submit", post(mission::submit_mission))
        .route("/api/v1/wallet", get(wallet::wallet))
        .route("/api/v1/wallet/withdrawals", post(wallet::request_withdrawal))
        .route("/api/v1/profile", get(wallet::profile))
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<u8>,
}

/// JSON error response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                completeness: None,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

impl From<WorkbenchError> for ApiError {
    fn from(err: WorkbenchError) -> Self {
        let status = match &err {
            WorkbenchError::NotSignedIn => StatusCode::UNAUTHORIZED,
            WorkbenchError::UnknownAccount(_)
            | WorkbenchError::UnknownPasskey
            | WorkbenchError::NoMission
            | WorkbenchError::Lifecycle(LifecycleError::JobNotFound(_))
            | WorkbenchError::Capture(CaptureError::UnknownTicket(_)) => StatusCode::NOT_FOUND,
            WorkbenchError::AccountExists(_)
            | WorkbenchError::Rejected(_)
            | WorkbenchError::Lifecycle(LifecycleError::MissionInProgress(_))
            | WorkbenchError::Analyzing
            | WorkbenchError::Capture(CaptureError::Busy) => StatusCode::CONFLICT,
            WorkbenchError::Capture(CaptureError::Image(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            WorkbenchError::InsufficientBalance { .. } | WorkbenchError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WorkbenchError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        if status.is_server_error() {
            tracing::error!(error = %err, "Request failed");
        }

        let mut api_error = ApiError::new(status, err.to_string());
        if let WorkbenchError::Rejected(SubmitRejection::Incomplete { completeness }) = err {
            api_error.body.completeness = Some(completeness);
        }
        api_error
    }
}

/// Session id from a verified `Authorization: Bearer` token.
pub struct CurrentSession(pub Uuid);

impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or_else(|| ApiError::new(StatusCode::UNAUTHORIZED, "Missing bearer token"))?;

        let claims = state
            .tokens
            .verify(token)
            .map_err(|e| ApiError::new(StatusCode::UNAUTHORIZED, e.to_string()))?;

        Ok(CurrentSession(claims.sid))
    }
}
