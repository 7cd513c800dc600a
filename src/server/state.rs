//! Shared server state

use chrono::{DateTime, Utc};

use super::ServerConfig;
use crate::inference::InferenceService;

pub struct AppState {
    pub service: InferenceService,
    pub config: ServerConfig,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: InferenceService, config: ServerConfig) -> Self {
        Self {
            service,
            config,
            started_at: Utc::now(),
        }
    }
}
