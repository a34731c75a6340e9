// Ordered collection of labeled pose samples

use crate::models::pose::PoseSample;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Insertion-ordered sequence of pose samples.
///
/// Serializes as a bare JSON array so recorded files and exports share one
/// format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    samples: Vec<PoseSample>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: Vec<PoseSample>) -> Self {
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[PoseSample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PoseSample> {
        self.samples.iter()
    }

    pub fn into_samples(self) -> Vec<PoseSample> {
        self.samples
    }

    /// Append the results of a completed capture session or import
    pub fn append(&mut self, samples: Vec<PoseSample>) {
        self.samples.extend(samples);
    }

    /// Distinct labels, sorted
    pub fn labels(&self) -> BTreeSet<String> {
        self.samples.iter().map(|s| s.label.clone()).collect()
    }

    pub fn count_label(&self, label: &str) -> usize {
        self.samples.iter().filter(|s| s.label == label).count()
    }

    /// Reject the dataset if any sample has the wrong feature length
    pub fn validate(&self, landmark_count: usize) -> DatasetResult<()> {
        let expected = PoseSample::expected_len(landmark_count);
        match self
            .samples
            .iter()
            .enumerate()
            .find(|(_, s)| s.data.len() != expected)
        {
            Some((index, sample)) => Err(DatasetError::MalformedSample {
                index,
                expected,
                actual: sample.data.len(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) fn samples_mut(&mut self) -> &mut [PoseSample] {
        &mut self.samples
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a PoseSample;
    type IntoIter = std::slice::Iter<'a, PoseSample>;

    fn into_iter(self) -> Self::IntoIter {
        self.samples.iter()
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Malformed sample at row {index}: expected {expected} values, got {actual}")]
    MalformedSample {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid train fraction: {0}. Must be between 0.0 and 1.0")]
    InvalidFraction(f64),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type DatasetResult<T> = Result<T, DatasetError>;
