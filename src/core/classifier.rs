// Pose classifier abstraction
// The trainer feeds flattened pose rows to a backend and asks it for ranked
// label predictions

use crate::models::training::{Prediction, TrainingConfig, TrainingError, TrainingResult, TrainingSummary};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Instant;

/// Trainable multi-class classifier over fixed-length feature vectors
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Queue one labeled row for the next training run
    fn add_training_row(&mut self, features: &[f32], label: &str) -> TrainingResult<()>;

    /// Rescale the queued rows before training
    fn normalize(&mut self);

    /// Fit the model on every queued row
    async fn train(&mut self, config: &TrainingConfig) -> TrainingResult<TrainingSummary>;

    /// Predictions for one row, most confident first
    async fn classify(&self, features: &[f32]) -> TrainingResult<Vec<Prediction>>;

    /// Get backend info
    fn model_info(&self) -> String;
}

// ==============================================================================
// Nearest Centroid Implementation
// ==============================================================================

#[derive(Debug, Clone, Default)]
struct FeatureRange {
    min: Vec<f32>,
    max: Vec<f32>,
}

impl FeatureRange {
    fn fit(rows: &[(Vec<f32>, String)], dims: usize) -> Self {
        let mut min = vec![f32::INFINITY; dims];
        let mut max = vec![f32::NEG_INFINITY; dims];
        for (features, _) in rows {
            for (i, value) in features.iter().enumerate() {
                min[i] = min[i].min(*value);
                max[i] = max[i].max(*value);
            }
        }
        Self { min, max }
    }

    /// Map each value into [0, 1]; constant dimensions map to 0
    fn scale(&self, features: &[f32]) -> Vec<f32> {
        features
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let span = self.max[i] - self.min[i];
                if span > f32::EPSILON {
                    (value - self.min[i]) / span
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Min-max normalized nearest-centroid classifier.
///
/// Confidence is a softmax over negative Euclidean distances to each
/// label's centroid.
#[derive(Debug, Default)]
pub struct NearestCentroidClassifier {
    rows: Vec<(Vec<f32>, String)>,
    dims: Option<usize>,
    range: Option<FeatureRange>,
    centroids: BTreeMap<String, Vec<f32>>,
}

impl NearestCentroidClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        !self.centroids.is_empty()
    }

    pub fn labels(&self) -> Vec<String> {
        self.centroids.keys().cloned().collect()
    }

    fn scale(&self, features: &[f32]) -> Vec<f32> {
        match &self.range {
            Some(range) => range.scale(features),
            None => features.to_vec(),
        }
    }
}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[async_trait]
impl Classifier for NearestCentroidClassifier {
    fn add_training_row(&mut self, features: &[f32], label: &str) -> TrainingResult<()> {
        match self.dims {
            Some(dims) if dims != features.len() => {
                return Err(TrainingError::DimensionMismatch {
                    expected: dims,
                    actual: features.len(),
                });
            }
            Some(_) => {}
            None => self.dims = Some(features.len()),
        }

        self.rows.push((features.to_vec(), label.to_string()));
        Ok(())
    }

    fn normalize(&mut self) {
        if let Some(dims) = self.dims {
            self.range = Some(FeatureRange::fit(&self.rows, dims));
        }
    }

    async fn train(&mut self, config: &TrainingConfig) -> TrainingResult<TrainingSummary> {
        let dims = match self.dims {
            Some(dims) if !self.rows.is_empty() => dims,
            _ => return Err(TrainingError::EmptyTrainingSet),
        };

        let started = Instant::now();
        let mut sums: BTreeMap<String, (Vec<f32>, usize)> = BTreeMap::new();
        for (features, label) in &self.rows {
            let scaled = self.scale(features);
            let (sum, count) = sums
                .entry(label.clone())
                .or_insert_with(|| (vec![0.0; dims], 0));
            for (acc, value) in sum.iter_mut().zip(&scaled) {
                *acc += value;
            }
            *count += 1;
        }

        self.centroids = sums
            .into_iter()
            .map(|(label, (sum, count))| {
                let centroid = sum.into_iter().map(|v| v / count as f32).collect();
                (label, centroid)
            })
            .collect();

        log::debug!(
            "Fitted {} centroids over {} rows ({} dims)",
            self.centroids.len(),
            self.rows.len(),
            dims
        );

        Ok(TrainingSummary {
            rows: self.rows.len(),
            labels: self.labels(),
            epochs: config.epochs,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn classify(&self, features: &[f32]) -> TrainingResult<Vec<Prediction>> {
        if !self.is_trained() {
            return Err(TrainingError::NotTrained);
        }
        if let Some(dims) = self.dims {
            if dims != features.len() {
                return Err(TrainingError::DimensionMismatch {
                    expected: dims,
                    actual: features.len(),
                });
            }
        }

        let scaled = self.scale(features);
        let distances: Vec<(&String, f32)> = self
            .centroids
            .iter()
            .map(|(label, centroid)| (label, distance(&scaled, centroid)))
            .collect();

        // Shift by the smallest distance so the exponentials stay in range
        let nearest = distances
            .iter()
            .map(|(_, d)| *d)
            .fold(f32::INFINITY, f32::min);
        let weights: Vec<f32> = distances.iter().map(|(_, d)| (nearest - d).exp()).collect();
        let total: f32 = weights.iter().sum();

        let mut predictions: Vec<Prediction> = distances
            .iter()
            .zip(&weights)
            .map(|((label, _), weight)| Prediction {
                label: (*label).clone(),
                confidence: weight / total,
            })
            .collect();
        predictions.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(predictions)
    }

    fn model_info(&self) -> String {
        format!(
            "Nearest centroid classifier ({} labels, {} rows)",
            self.centroids.len(),
            self.rows.len()
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

pub type DefaultClassifier = NearestCentroidClassifier;
