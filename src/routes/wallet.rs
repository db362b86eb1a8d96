use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::app_state::AppState;
use crate::models::api::WithdrawalRequest;
use crate::models::profile::{Transaction, UserProfile, Wallet};
use crate::routes::{ApiError, CurrentSession};

/// GET /api/v1/wallet: Balance and transaction history.
pub async fn wallet(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<Wallet>, ApiError> {
    Ok(Json(state.workbench.wallet(sid).await?))
}

/// POST /api/v1/wallet/withdrawals: Queue a bKash cash-out request.
pub async fn request_withdrawal(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
    Json(form): Json<WithdrawalRequest>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let transaction = state.workbench.request_withdrawal(sid, form).await?;
    Ok((StatusCode::ACCEPTED, Json(transaction)))
}

/// GET /api/v1/profile
pub async fn profile(
    State(state): State<AppState>,
    CurrentSession(sid): CurrentSession,
) -> Result<Json<UserProfile>, ApiError> {
    Ok(Json(state.workbench.profile(sid).await?))
}
