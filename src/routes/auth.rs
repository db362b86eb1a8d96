use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::models::api::{
    LoginRequest, PasskeyLoginRequest, ProfileSummary, SessionResponse, SessionView, SignupRequest,
};
use crate::routes::{ApiError, CurrentSession};
use crate::services::passkey::{self, AssertionOptions, RegistrationOptions};
use crate::services::session::SessionContext;

fn session_response(state: &AppState, session: &SessionContext) -> Result<Json<SessionResponse>, ApiError> {
    let token = state
        .tokens
        .issue(session)
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(SessionResponse {
        token,
        session_id: session.id,
        profile: ProfileSummary::from(&session.profile),
    }))
}

/// POST /api/v1/auth/signup: Create a profile and sign in.
pub async fn sign_up(
    State(state): State<AppState>,
    Json(form): Json<SignupRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.workbench.sign_up(form).await?;
    session_response(&state, &session)
}

/// POST /api/v1/auth/login: Password sign-in.
pub async fn log_in(
    State(state): State<AppState>,
    Json(form): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.workbench.log_in(form).await?;
    session_response(&state, &session)
}

#[derive(Debug, Deserialize)]
pub struct RegistrationQuery {
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// GET /api/v1/auth/passkey/registration: Options for `navigator.credentials.create`.
pub async fn passkey_registration_options(
    State(state): State<AppState>,
    Query(query): Query<RegistrationQuery>,
) -> Json<RegistrationOptions> {
    Json(passkey::registration_options(
        &state.passkey_rp_id,
        &query.email,
        &query.name,
    ))
}

/// GET /api/v1/auth/passkey/assertion: Options for `navigator.credentials.get`.
pub async fn passkey_assertion_options() -> Json<AssertionOptions> {
    Json(passkey::assertion_options())
}

/// POST /api/v1/auth/passkey: Sign in with a platform credential id.
pub async fn log_in_with_passkey(
    State(state): State<AppState>,
    Json(form): Json<PasskeyLoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.workbench.log_in_with_passkey(form).await?;
    session_response(&state, &session)
}

/// POST /api/v1/auth/logout
pub async fn log_out(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<StatusCode, ApiError> {
    state.workbench.log_out(sid).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/session: Header data plus the wellness flag.
pub async fn session(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<SessionView>, ApiError> {
    Ok(Json(state.workbench.session_view(sid).await?))
}

/// POST /api/v1/session/wellness/dismiss
pub async fn dismiss_wellness(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<StatusCode, ApiError> {
    state.workbench.dismiss_wellness(sid).await?;
    Ok(StatusCode::NO_CONTENT)
}
