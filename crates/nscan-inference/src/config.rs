//! Classifier configuration.

use std::path::PathBuf;

use tracing::warn;

use nscan_models::{NormalizationMode, PackagingKind, PreprocessConfig};

/// Default ordered label set the NutriScan model was trained on.
pub const DEFAULT_LABELS: &[&str] = &["healthy", "mild", "moderate", "severe"];

/// Configuration for model acquisition, loading and preprocessing.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Remote location of the model artifact.
    pub model_url: String,
    /// Local path the artifact is cached at.
    pub model_path: PathBuf,
    /// Packaging format of the artifact.
    pub packaging: PackagingKind,
    /// Serving entry point name for saved-graph models.
    pub signature: String,
    /// Preprocessing applied to every upload.
    pub preprocess: PreprocessConfig,
    /// Ordered output labels. Must match the model's training label order.
    pub labels: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_url: "https://models.nutriscan.dev/nutriscan_efficientnetb0.onnx"
                .to_string(),
            model_path: PathBuf::from("model/nutriscan_efficientnetb0.onnx"),
            packaging: PackagingKind::WeightsFile,
            signature: "serving_default".to_string(),
            preprocess: PreprocessConfig::default(),
            labels: DEFAULT_LABELS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifierConfig {
    /// Create config from environment variables.
    ///
    /// Unknown values for `MODEL_FORMAT` and `NORMALIZE_MODE` fall back to
    /// the defaults with a warning rather than refusing to start.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(url) = std::env::var("MODEL_URL") {
            config.model_url = url;
        }
        if let Ok(path) = std::env::var("MODEL_PATH") {
            config.model_path = PathBuf::from(path);
        }
        if let Ok(format) = std::env::var("MODEL_FORMAT") {
            match PackagingKind::parse(&format) {
                Some(kind) => config.packaging = kind,
                None => warn!(
                    "Invalid MODEL_FORMAT '{}', using {}. Valid values: weights, saved-graph",
                    format, config.packaging
                ),
            }
        }
        if let Ok(signature) = std::env::var("MODEL_SIGNATURE") {
            config.signature = signature;
        }
        if let Ok(mode) = std::env::var("NORMALIZE_MODE") {
            match NormalizationMode::parse(&mode) {
                Some(normalization) => config.preprocess.normalization = normalization,
                None => warn!(
                    "Invalid NORMALIZE_MODE '{}', using {}. Valid values: divide, efficientnet",
                    mode, config.preprocess.normalization
                ),
            }
        }
        config.preprocess.width = std::env::var("IMG_WIDTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.preprocess.width);
        config.preprocess.height = std::env::var("IMG_HEIGHT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(config.preprocess.height);

        if let Ok(labels) = std::env::var("CLASS_LABELS") {
            let parsed: Vec<String> = labels
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect();
            if parsed.is_empty() {
                warn!("CLASS_LABELS is empty, keeping default label set");
            } else {
                config.labels = parsed;
            }
        }

        config
    }
}
