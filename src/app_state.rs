use std::sync::Arc;

use crate::services::{
    gateway::GeminiClient, session::TokenIssuer, store::ProfileBackend, workbench::Workbench,
};

pub type AppWorkbench = Workbench<GeminiClient, ProfileBackend>;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub workbench: AppWorkbench,
    pub tokens: Arc<TokenIssuer>,
    pub passkey_rp_id: Arc<str>,
}

impl AppState {
    pub fn new(workbench: AppWorkbench, tokens: TokenIssuer, passkey_rp_id: &str) -> Self {
        Self {
            workbench,
            tokens: Arc::new(tokens),
            passkey_rp_id: Arc::from(passkey_rp_id),
        }
    }
}
