// Trainer / evaluator
// Drives a classifier backend over a dataset split and scores the result

use crate::core::classifier::Classifier;
use crate::core::dataset::{shuffle_split, SplitBoundary};
use crate::models::dataset::{Dataset, DatasetError};
use crate::models::training::{
    EvaluationReport, LabelStats, Misclassification, TrainingConfig, TrainingError, TrainingResult,
    TrainingSummary,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a full shuffle, split, train and evaluate run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRun {
    pub train_len: usize,
    pub test_len: usize,
    pub summary: TrainingSummary,
    pub report: EvaluationReport,
}

/// Feed every row of `train_set` to the classifier, normalize and train.
///
/// The whole set is validated first, so a malformed row means nothing
/// reaches the classifier.
pub async fn train(
    train_set: &Dataset,
    classifier: &mut dyn Classifier,
    config: &TrainingConfig,
    landmark_count: usize,
) -> TrainingResult<TrainingSummary> {
    if let Err(DatasetError::MalformedSample { index, expected, actual }) = train_set.validate(landmark_count) {
        return Err(TrainingError::MalformedSample { index, expected, actual });
    }

    if train_set.is_empty() {
        return Err(TrainingError::EmptyTrainingSet);
    }

    for sample in train_set {
        classifier.add_training_row(&sample.data, &sample.label)?;
    }
    classifier.normalize();

    log::info!(
        "Training on {} samples for {} epochs ({})",
        train_set.len(),
        config.epochs,
        classifier.model_info()
    );

    let summary = classifier.train(config).await?;
    log::info!("Finished training in {} ms", summary.duration_ms);
    Ok(summary)
}

/// Classify every row of `test_set` and tally the top predictions
pub async fn evaluate(test_set: &Dataset, classifier: &dyn Classifier) -> TrainingResult<EvaluationReport> {
    if test_set.is_empty() {
        return Err(TrainingError::DegenerateEvaluation);
    }

    let mut correct = 0;
    let mut per_label: BTreeMap<String, LabelStats> = BTreeMap::new();
    let mut misclassifications = Vec::new();

    for sample in test_set {
        let predictions = classifier.classify(&sample.data).await?;
        let top = predictions.first().ok_or(TrainingError::NoPrediction)?;

        per_label.entry(sample.label.clone()).or_default().support += 1;
        per_label.entry(top.label.clone()).or_default().predicted += 1;

        if top.label == sample.label {
            correct += 1;
            per_label.entry(sample.label.clone()).or_default().correct += 1;
        } else {
            log::info!(
                "predicted {} while the actual label is {}",
                top.label,
                sample.label
            );
            misclassifications.push(Misclassification {
                expected: sample.label.clone(),
                predicted: top.label.clone(),
            });
        }
    }

    let total = test_set.len();
    let accuracy = correct as f64 / total as f64;
    log::info!("Accuracy {:.3} ({} / {})", accuracy, correct, total);

    Ok(EvaluationReport {
        total,
        correct,
        accuracy,
        per_label,
        misclassifications,
    })
}

/// Shuffle and split `dataset`, train on the first partition and evaluate
/// on the second
pub async fn train_and_evaluate<R: Rng>(
    dataset: Dataset,
    classifier: &mut dyn Classifier,
    config: &TrainingConfig,
    landmark_count: usize,
    train_fraction: f64,
    boundary: SplitBoundary,
    rng: &mut R,
) -> TrainingResult<TrainingRun> {
    let (train_set, test_set) = shuffle_split(dataset, train_fraction, boundary, rng)?;

    let summary = train(&train_set, classifier, config, landmark_count).await?;
    let report = evaluate(&test_set, classifier).await?;

    Ok(TrainingRun {
        train_len: train_set.len(),
        test_len: test_set.len(),
        summary,
        report,
    })
}
