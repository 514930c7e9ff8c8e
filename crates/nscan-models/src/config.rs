//! Preprocessing and model-packaging configuration types.

use serde::{Deserialize, Serialize};

/// Pixel-value scaling applied before inference.
///
/// The configured mode must match whatever the model was trained with.
/// A mismatch is not detectable at runtime; it silently degrades every
/// confidence score the model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    /// Scale every channel value by 1/255 into `[0, 1]`.
    Divide,
    /// Scale by 1/255, then subtract the ImageNet channel means and divide
    /// by the channel standard deviations (EfficientNet training scheme).
    #[default]
    Efficientnet,
}

impl NormalizationMode {
    /// Parse from environment variable or string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "divide" | "scale" => Some(Self::Divide),
            "efficientnet" | "imagenet" => Some(Self::Efficientnet),
            _ => None,
        }
    }
}

impl std::fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Divide => write!(f, "divide"),
            Self::Efficientnet => write!(f, "efficientnet"),
        }
    }
}

/// Serialization format the model artifact was saved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PackagingKind {
    /// A single weights file; inference maps input straight to scores.
    #[default]
    WeightsFile,
    /// An exported computation graph in a directory, invoked through a
    /// named serving entry point.
    SavedGraph,
}

impl PackagingKind {
    /// Parse from environment variable or string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "weights" | "weights-file" | "file" => Some(Self::WeightsFile),
            "saved-graph" | "savedgraph" | "graph" => Some(Self::SavedGraph),
            _ => None,
        }
    }
}

impl std::fmt::Display for PackagingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WeightsFile => write!(f, "weights-file"),
            Self::SavedGraph => write!(f, "saved-graph"),
        }
    }
}

/// Immutable preprocessing configuration, set once at startup.
///
/// Channel order is always RGB; the decoder converts grayscale, RGBA and
/// palette sources before resizing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Pixel normalization mode.
    pub normalization: NormalizationMode,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            width: 224,
            height: 224,
            normalization: NormalizationMode::Efficientnet,
        }
    }
}

impl PreprocessConfig {
    /// Create a config with an explicit target size.
    pub fn new(width: u32, height: u32, normalization: NormalizationMode) -> Self {
        Self {
            width,
            height,
            normalization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization_mode_parse() {
        assert_eq!(
            NormalizationMode::parse("divide"),
            Some(NormalizationMode::Divide)
        );
        assert_eq!(
            NormalizationMode::parse("EfficientNet"),
            Some(NormalizationMode::Efficientnet)
        );
        assert_eq!(NormalizationMode::parse("minmax"), None);
    }

    #[test]
    fn test_packaging_kind_parse() {
        assert_eq!(
            PackagingKind::parse("weights"),
            Some(PackagingKind::WeightsFile)
        );
        assert_eq!(
            PackagingKind::parse("saved-graph"),
            Some(PackagingKind::SavedGraph)
        );
        assert_eq!(PackagingKind::parse("torchscript"), None);
    }

    #[test]
    fn test_default_preprocess_config() {
        let config = PreprocessConfig::default();
        assert_eq!(config.width, 224);
        assert_eq!(config.height, 224);
        assert_eq!(config.normalization, NormalizationMode::Efficientnet);
    }
}
