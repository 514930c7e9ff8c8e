//! Model handle over the two supported packaging kinds.
//!
//! Both kinds load into an `ort` session and expose the same `infer`
//! operation, so the pipeline never branches on packaging format. The
//! session is wrapped in a mutex: `ort::Session::run` needs exclusive
//! access, so concurrent requests serialize on the single loaded model.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::info;

use nscan_models::{PackagingKind, PreprocessConfig};

use crate::error::{InferenceError, LoadError};

/// The one capability the pipeline needs from a loaded model.
///
/// Implemented by [`ModelHandle`] for real inference and by stub models in
/// tests, keeping lifecycle and substitution explicit.
pub trait ScoreModel: Send + Sync {
    /// Map an input tensor to a score vector of length `num_classes`.
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError>;
}

/// A loaded model, created once at startup and shared read-only afterwards.
pub struct ModelHandle {
    session: Mutex<Session>,
    /// Name of the output tensor `infer` extracts.
    output_name: String,
    num_classes: usize,
    kind: PackagingKind,
}

impl ModelHandle {
    /// Load the model artifact at `path` and validate it against the
    /// configured label count.
    ///
    /// Called exactly once per process. Any failure here is fatal: the
    /// service must not start with a missing or mismatched model. The load
    /// ends with a probe inference on a zero tensor of the configured input
    /// shape, which surfaces shape and cardinality mismatches at startup
    /// instead of on the first request.
    pub fn load(
        path: &Path,
        kind: PackagingKind,
        signature: &str,
        preprocess: &PreprocessConfig,
        num_classes: usize,
    ) -> Result<Self, LoadError> {
        let graph_path = match kind {
            PackagingKind::WeightsFile => {
                if !path.is_file() {
                    return Err(LoadError::NotFound(path.to_path_buf()));
                }
                path.to_path_buf()
            }
            PackagingKind::SavedGraph => resolve_graph_file(path)?,
        };

        let model_bytes = std::fs::read(&graph_path)?;

        let session = Session::builder()
            .map_err(|e| LoadError::session(format!("session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| LoadError::session(format!("optimization level: {e}")))?
            .commit_from_memory(&model_bytes)
            .map_err(|e| LoadError::session(format!("load model: {e}")))?;

        let output_name = resolve_output_name(&session, kind, signature)?;

        let handle = Self {
            session: Mutex::new(session),
            output_name,
            num_classes,
            kind,
        };

        handle.probe(preprocess)?;

        info!(
            path = %graph_path.display(),
            kind = %kind,
            output = %handle.output_name,
            classes = num_classes,
            "Model loaded"
        );

        Ok(handle)
    }

    /// Packaging kind this handle was loaded from.
    pub fn kind(&self) -> PackagingKind {
        self.kind
    }

    /// Run a zero-tensor inference and check the output cardinality.
    fn probe(&self, preprocess: &PreprocessConfig) -> Result<(), LoadError> {
        let zero = Array4::<f32>::zeros((
            1,
            preprocess.height as usize,
            preprocess.width as usize,
            3,
        ));
        let scores = self.infer(&zero)?;
        if scores.len() != self.num_classes {
            return Err(LoadError::OutputCardinality {
                expected: self.num_classes,
                actual: scores.len(),
            });
        }
        Ok(())
    }
}

impl ScoreModel for ModelHandle {
    fn infer(&self, input: &Array4<f32>) -> Result<Vec<f32>, InferenceError> {
        let shape: Vec<usize> = input.shape().to_vec();
        let data: Box<[f32]> = input.iter().copied().collect();

        let tensor = Tensor::from_array((shape, data))
            .map(Value::from)
            .map_err(|e| InferenceError::runtime(format!("input tensor: {e}")))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::runtime("session poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::runtime(format!("run failed: {e}")))?;

        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::runtime(format!(
                "model returned no output named '{}'",
                self.output_name
            ))
        })?;

        let (out_shape, out_data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::runtime(format!("extract output: {e}")))?;

        squeeze_scores(out_shape, out_data, self.num_classes)
    }
}

/// Squeeze the batch dimension and validate the score count.
///
/// Accepts `(1, n)` and `(n,)` output shapes; both kinds are normalized to
/// a flat vector of `expected` scores.
fn squeeze_scores(
    shape: &[i64],
    data: &[f32],
    expected: usize,
) -> Result<Vec<f32>, InferenceError> {
    let n = match shape.len() {
        2 if shape[0] == 1 => shape[1] as usize,
        1 => shape[0] as usize,
        _ => {
            return Err(InferenceError::OutputShape(format!("{shape:?}")));
        }
    };

    if n != expected || data.len() < n {
        return Err(InferenceError::ScoreCount {
            expected,
            actual: n,
        });
    }

    Ok(data[..n].to_vec())
}

/// Locate the graph file inside an extracted saved-graph directory.
fn resolve_graph_file(dir: &Path) -> Result<PathBuf, LoadError> {
    if !dir.is_dir() {
        return Err(LoadError::NotFound(dir.to_path_buf()));
    }

    let canonical = dir.join("saved_model.onnx");
    if canonical.is_file() {
        return Ok(canonical);
    }

    let mut onnx_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|p| p.extension().map(|e| e == "onnx").unwrap_or(false))
        .collect();
    onnx_files.sort();

    match onnx_files.len() {
        1 => Ok(onnx_files.remove(0)),
        0 => Err(LoadError::graph_missing(format!(
            "no .onnx file under {}",
            dir.display()
        ))),
        n => Err(LoadError::graph_missing(format!(
            "{} .onnx files under {}, expected one",
            n,
            dir.display()
        ))),
    }
}

/// Pick the output tensor `infer` extracts.
///
/// Weights-file models expose a single head; the first declared output is
/// it. Saved graphs carry named serving outputs; prefer the one matching
/// the configured signature and fall back to the first declared output.
fn resolve_output_name(
    session: &Session,
    kind: PackagingKind,
    signature: &str,
) -> Result<String, LoadError> {
    let first = session
        .outputs
        .first()
        .map(|o| o.name.clone())
        .ok_or_else(|| LoadError::session("model declares no outputs"))?;

    match kind {
        PackagingKind::WeightsFile => Ok(first),
        PackagingKind::SavedGraph => Ok(session
            .outputs
            .iter()
            .find(|o| o.name.contains(signature))
            .map(|o| o.name.clone())
            .unwrap_or(first)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_squeeze_scores_accepts_batched_shape() {
        let scores = squeeze_scores(&[1, 4], &[0.1, 0.7, 0.1, 0.1], 4).unwrap();
        assert_eq!(scores, vec![0.1, 0.7, 0.1, 0.1]);
    }

    #[test]
    fn test_squeeze_scores_accepts_flat_shape() {
        let scores = squeeze_scores(&[4], &[0.25, 0.25, 0.25, 0.25], 4).unwrap();
        assert_eq!(scores.len(), 4);
    }

    #[test]
    fn test_squeeze_scores_rejects_cardinality_mismatch() {
        let err = squeeze_scores(&[1, 3], &[0.5, 0.3, 0.2], 4).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::ScoreCount {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_squeeze_scores_rejects_extra_dims() {
        let err = squeeze_scores(&[1, 2, 2], &[0.0; 4], 4).unwrap_err();
        assert!(matches!(err, InferenceError::OutputShape(_)));
    }

    #[test]
    fn test_resolve_graph_prefers_saved_model_name() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("saved_model.onnx"), b"a").unwrap();
        std::fs::write(dir.path().join("other.onnx"), b"b").unwrap();

        let resolved = resolve_graph_file(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("saved_model.onnx"));
    }

    #[test]
    fn test_resolve_graph_finds_sole_onnx_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("exported.onnx"), b"a").unwrap();
        std::fs::write(dir.path().join("labels.txt"), b"x").unwrap();

        let resolved = resolve_graph_file(dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("exported.onnx"));
    }

    #[test]
    fn test_resolve_graph_rejects_empty_dir() {
        let dir = TempDir::new().unwrap();
        let err = resolve_graph_file(dir.path()).unwrap_err();
        assert!(matches!(err, LoadError::GraphMissing(_)));
    }

    #[test]
    fn test_resolve_graph_rejects_missing_dir() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = resolve_graph_file(&missing).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }
}
