//! Classification pipeline: preprocess, infer, synthesize.

use std::sync::Arc;

use indexmap::IndexMap;

use nscan_models::{ClassificationResult, PreprocessConfig};

use crate::error::PipelineError;
use crate::model::ScoreModel;
use crate::preprocess;

/// Orchestrates one synchronous classification per call.
///
/// Holds the loaded model by explicit handle; constructed once at startup
/// and shared across requests. The pipeline itself keeps no mutable state.
pub struct ClassifierPipeline {
    model: Arc<dyn ScoreModel>,
    labels: Vec<String>,
    preprocess: PreprocessConfig,
}

impl ClassifierPipeline {
    /// Create a pipeline over a loaded model and its label set.
    pub fn new(
        model: Arc<dyn ScoreModel>,
        labels: Vec<String>,
        preprocess: PreprocessConfig,
    ) -> Self {
        Self {
            model,
            labels,
            preprocess,
        }
    }

    /// Ordered label set this pipeline reports over.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify one uploaded image.
    ///
    /// A malformed image is a client error; a runtime failure during
    /// inference is a server error. Neither is retried here.
    pub fn classify(&self, image_bytes: &[u8]) -> Result<ClassificationResult, PipelineError> {
        let tensor = preprocess::prepare(image_bytes, &self.preprocess)?;
        let scores = self.model.infer(&tensor)?;
        Ok(self.synthesize(&scores))
    }

    /// Turn a raw score vector into the structured result.
    fn synthesize(&self, scores: &[f32]) -> ClassificationResult {
        // Ties break toward the lowest index: only a strictly greater
        // score moves the winner.
        let mut predicted = 0;
        for (i, score) in scores.iter().enumerate() {
            if *score > scores[predicted] {
                predicted = i;
            }
        }

        let all_scores: IndexMap<String, f64> = self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, score)| (label.clone(), round4(*score)))
            .collect();

        ClassificationResult {
            classification: self.labels[predicted].clone(),
            confidence: round4(scores[predicted]),
            all_scores,
        }
    }
}

/// Round to 4 decimal digits, the precision the API reports.
fn round4(value: f32) -> f64 {
    (value as f64 * 10_000.0).round() / 10_000.0
}
