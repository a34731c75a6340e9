// Data models for classifier training and evaluation

use crate::models::dataset::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==============================================================================
// Hyperparameters
// ==============================================================================

/// Settings handed to the classifier backend when training starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub epochs: u32,               // Optimization passes (default: 50)
    pub learning_rate: f32,        // Default: 0.15
    pub hidden_layers: Vec<u32>,   // Dense layer widths for network backends
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            learning_rate: 0.15,
            hidden_layers: vec![32, 8, 16],
        }
    }
}

/// Returned by a classifier once training has completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub rows: usize,
    pub labels: Vec<String>,
    pub epochs: u32,
    pub duration_ms: u64,
}

/// One entry of a ranked classification result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f32,
}

// ==============================================================================
// Evaluation
// ==============================================================================

/// Per-label tallies collected during evaluation.
///
/// `correct` is what the accuracy is built from. `support` and `predicted` allow
/// recall and precision to be derived as well.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelStats {
    pub correct: usize,   // Test rows of this label classified correctly
    pub support: usize,   // Test rows carrying this label
    pub predicted: usize, // Test rows the classifier assigned this label
}

impl LabelStats {
    pub fn recall(&self) -> Option<f64> {
        if self.support == 0 {
            None
        } else {
            Some(self.correct as f64 / self.support as f64)
        }
    }

    pub fn precision(&self) -> Option<f64> {
        if self.predicted == 0 {
            None
        } else {
            Some(self.correct as f64 / self.predicted as f64)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misclassification {
    pub expected: String,
    pub predicted: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub correct: usize,
    pub accuracy: f64,
    pub per_label: BTreeMap<String, LabelStats>,
    pub misclassifications: Vec<Misclassification>,
}

impl EvaluationReport {
    pub fn correct_for(&self, label: &str) -> usize {
        self.per_label.get(label).map(|s| s.correct).unwrap_or(0)
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TrainingError {
    #[error("Training set is empty")]
    EmptyTrainingSet,

    #[error("Degenerate evaluation: test set is empty, accuracy is undefined")]
    DegenerateEvaluation,

    #[error("Malformed sample at row {index}: expected {expected} values, got {actual}")]
    MalformedSample {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Classifier has not been trained")]
    NotTrained,

    #[error("Feature vector has {actual} values, classifier was fitted on {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Classifier returned no predictions")]
    NoPrediction,

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),
}

pub type TrainingResult<T> = Result<T, TrainingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 50);
        assert_eq!(config.learning_rate, 0.15);
        assert_eq!(config.hidden_layers, vec![32, 8, 16]);
    }

    #[test]
    fn test_label_stats_ratios() {
        let stats = LabelStats {
            correct: 3,
            support: 4,
            predicted: 6,
        };
        assert_eq!(stats.recall(), Some(0.75));
        assert_eq!(stats.precision(), Some(0.5));

        let empty = LabelStats::default();
        assert_eq!(empty.recall(), None);
        assert_eq!(empty.precision(), None);
    }
}
