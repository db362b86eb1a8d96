use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::store::ProfileStore;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub profile_store: ComponentHealth,
    pub vision_gateway: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub latency_ms: Option<u64>,
}

/// GET /health: profile store reachability plus gateway configuration.
///
/// A missing Gemini key is reported but does not fail the check: captures
/// still work and analyses degrade to their fallback text.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let store = state.workbench.store();

    let start = std::time::Instant::now();
    let store_check = match store.health_check().await {
        Ok(_) => ComponentHealth {
            status: "ok".to_string(),
            backend: Some(store.kind().to_string()),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        },
        Err(e) => {
            tracing::warn!(error = %e, "Profile store health check failed");
            ComponentHealth {
                status: "error".to_string(),
                backend: Some(store.kind().to_string()),
                latency_ms: None,
            }
        }
    };

    let gateway_check = ComponentHealth {
        status: if state.workbench.gateway().is_configured() {
            "ok".to_string()
        } else {
            "unconfigured".to_string()
        },
        backend: None,
        latency_ms: None,
    };

    let healthy = store_check.status == "ok";
    let status_code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if healthy && gateway_check.status == "ok" {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            profile_store: store_check,
            vision_gateway: gateway_check,
        },
    };

    (status_code, Json(response))
}
