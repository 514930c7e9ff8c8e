//! Error types for model loading, preprocessing and inference.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading the model into memory. Fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("No model graph in artifact directory: {0}")]
    GraphMissing(String),

    #[error("Failed to read model file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inference session init failed: {0}")]
    Session(String),

    #[error("Model outputs {actual} classes but {expected} labels are configured")]
    OutputCardinality { expected: usize, actual: usize },

    #[error("Probe inference failed: {0}")]
    Probe(#[from] InferenceError),
}

impl LoadError {
    /// Create a session init failure error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session(message.into())
    }

    /// Create a missing-graph error.
    pub fn graph_missing(message: impl Into<String>) -> Self {
        Self::GraphMissing(message.into())
    }
}

/// Errors while turning uploaded bytes into a model input tensor.
/// Recoverable, per-request: the client sent something unusable.
#[derive(Debug, Error)]
pub enum PreprocessError {
    #[error("Image decode failed: {0}")]
    Decode(String),

    #[error("Tensor layout error: {0}")]
    Shape(String),
}

impl PreprocessError {
    /// Create a decode failure error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

/// Errors from the inference runtime itself. Per-request, but indicates a
/// loaded-model problem rather than a client mistake.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Inference runtime failure: {0}")]
    Runtime(String),

    #[error("Model returned {actual} scores, expected {expected}")]
    ScoreCount { expected: usize, actual: usize },

    #[error("Unexpected model output shape: {0}")]
    OutputShape(String),
}

impl InferenceError {
    /// Create a runtime failure error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }
}

/// Per-request pipeline failure wrapping the stage that caused it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),

    #[error("Inference failed: {0}")]
    Inference(#[from] InferenceError),
}
