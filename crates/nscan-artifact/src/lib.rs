//! Model artifact acquisition and local caching.
//!
//! This crate provides:
//! - Idempotent download of the model artifact from its remote location
//! - Unpacking of archived (tar.gz) artifacts into a local directory
//! - Staged writes so a failed fetch or extraction never leaves a
//!   half-present artifact behind

pub mod error;
pub mod store;

pub use error::{ArtifactError, ArtifactResult};
pub use store::{ensure_local, ArtifactSource};
