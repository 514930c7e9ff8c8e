//! Model lifecycle and inference pipeline.
//!
//! This crate provides:
//! - Deterministic image preprocessing into model input tensors
//! - A uniform model handle over the two supported packaging kinds
//!   (single weights file, exported graph with a serving signature)
//! - The classification pipeline that turns uploaded image bytes into a
//!   probability distribution over the configured label set

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod preprocess;

pub use config::ClassifierConfig;
pub use error::{InferenceError, LoadError, PipelineError, PreprocessError};
pub use model::{ModelHandle, ScoreModel};
pub use pipeline::ClassifierPipeline;
pub use preprocess::prepare;
