//! Classification result returned to API clients.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Structured probability distribution over the configured label set.
///
/// `all_scores` keys are exactly the configured labels, in configured order.
/// `confidence` equals `all_scores[classification]`, and `classification` is
/// the label with the maximum score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Winning label.
    pub classification: String,
    /// Score of the winning label, rounded to 4 decimal digits.
    pub confidence: f64,
    /// Per-label scores in label order, rounded to 4 decimal digits.
    pub all_scores: IndexMap<String, f64>,
}
