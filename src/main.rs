use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use auditgig::app_state::AppState;
use auditgig::config::AppConfig;
use auditgig::routes;
use auditgig::services::{
    catalog,
    encryption::EncryptionService,
    gateway::GeminiClient,
    session::TokenIssuer,
    store::{MemoryProfileStore, ProfileBackend, ProfileCodec, RedisProfileStore},
    workbench::Workbench,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing auditgig client");

    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    metrics::describe_counter!("missions_started_total", "Missions accepted by the worker");
    metrics::describe_counter!("captures_total", "Camera captures opened, by target");
    metrics::describe_counter!(
        "gateway_calls_total",
        "Vision gateway calls, by operation and outcome"
    );
    metrics::describe_histogram!("gateway_call_seconds", "Vision gateway call latency");
    metrics::describe_counter!("missions_submitted_total", "Missions settled and paid out");
    metrics::describe_counter!("payout_amount_total", "Total reward credited to wallets");
    metrics::describe_gauge!("camera_sessions_open", "Camera streams currently held");

    // Profile blobs are sealed when a key is configured
    let codec = match &config.profile_encryption_key {
        Some(key) => {
            tracing::info!("Initializing AES-256-GCM profile encryption");
            ProfileCodec::sealed(
                EncryptionService::new(key).expect("Failed to initialize encryption"),
            )
        }
        None => ProfileCodec::default(),
    };

    let store = match &config.redis_url {
        Some(url) => {
            tracing::info!("Connecting to Redis profile store");
            ProfileBackend::Redis(
                RedisProfileStore::new(url, codec).expect("Failed to initialize profile store"),
            )
        }
        None => {
            tracing::warn!("REDIS_URL not set, profiles are kept in memory");
            ProfileBackend::Memory(MemoryProfileStore::new())
        }
    };

    let gateway = GeminiClient::new(&config.gemini_api_key, &config.gemini_model)
        .expect("Failed to initialize Gemini client");
    if !gateway.is_configured() {
        tracing::warn!("GEMINI_API_KEY not set, analyses will use fallback text");
    }

    let listings = match &config.jobs_file {
        Some(path) => {
            catalog::load_listings(Path::new(path)).expect("Failed to load mission catalog")
        }
        None => catalog::seed_listings(),
    };
    let jobs = catalog::into_jobs(listings).expect("Invalid mission catalog");

    let tokens =
        TokenIssuer::new(&config.session_secret).expect("Failed to initialize session tokens");

    let workbench = Workbench::new(gateway, store, jobs, config.workbench_settings());
    let state = AppState::new(workbench, tokens, &config.passkey_rp_id);

    let app = routes::router(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(10 * 1024 * 1024)); // 10 MB limit

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await.expect("Server error");
}
