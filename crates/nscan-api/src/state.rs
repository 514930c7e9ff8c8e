//! Application state.

use std::sync::Arc;

use nscan_inference::ClassifierPipeline;

use crate::config::ApiConfig;

/// Shared application state.
///
/// The pipeline is constructed once at startup around the loaded model
/// handle and shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: Arc<ClassifierPipeline>,
}

impl AppState {
    /// Create new application state.
    pub fn new(config: ApiConfig, pipeline: Arc<ClassifierPipeline>) -> Self {
        Self { config, pipeline }
    }
}
