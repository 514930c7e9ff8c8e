//! Shared data models for the NutriScan classifier backend.
//!
//! This crate provides Serde-serializable types for:
//! - Classification results returned to API clients
//! - Preprocessing configuration (target size, normalization mode)
//! - Model packaging kinds

pub mod config;
pub mod result;

// Re-export common types
pub use config::{NormalizationMode, PackagingKind, PreprocessConfig};
pub use result::ClassificationResult;
