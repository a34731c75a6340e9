// Dataset builder - flattens landmarks into labeled samples, merges,
// shuffles, splits and (de)serializes datasets

use crate::models::dataset::{Dataset, DatasetError, DatasetResult};
use crate::models::pose::{Landmark, PoseSample, VALUES_PER_LANDMARK};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default share of samples that go to the training partition
pub const DEFAULT_TRAIN_FRACTION: f64 = 0.8;

/// How the test partition starts relative to the split index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitBoundary {
    /// train = [0, b), test = [b, len)
    #[default]
    Exact,
    /// train = [0, b), test = [b + 1, len). The row at `b` is dropped,
    /// matching datasets split by the earlier browser tooling.
    SkipBoundaryRow,
}

// ==============================================================================
// Building
// ==============================================================================

/// Concatenate every landmark's x, y, z in list order
pub fn flatten(landmarks: &[Landmark]) -> Vec<f32> {
    let mut data = Vec::with_capacity(landmarks.len() * VALUES_PER_LANDMARK);
    for landmark in landmarks {
        data.push(landmark.x);
        data.push(landmark.y);
        data.push(landmark.z);
    }
    data
}

pub fn build_sample(landmarks: &[Landmark], label: &str) -> PoseSample {
    PoseSample::new(flatten(landmarks), label)
}

/// Concatenate two datasets, `a` first
pub fn merge(a: Dataset, b: Dataset) -> Dataset {
    let mut samples = a.into_samples();
    samples.extend(b.into_samples());
    Dataset::from_samples(samples)
}

// ==============================================================================
// Shuffling and Splitting
// ==============================================================================

/// Unbiased in-place Fisher-Yates shuffle
pub fn shuffle<T, R: Rng>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Index at which the training partition ends
pub fn split_index(len: usize, train_fraction: f64) -> usize {
    ((len as f64 * train_fraction).floor() as usize).min(len)
}

/// Shuffle `dataset` with `rng` and partition it into (train, test)
pub fn shuffle_split<R: Rng>(
    mut dataset: Dataset,
    train_fraction: f64,
    boundary: SplitBoundary,
    rng: &mut R,
) -> DatasetResult<(Dataset, Dataset)> {
    if !(0.0..=1.0).contains(&train_fraction) {
        return Err(DatasetError::InvalidFraction(train_fraction));
    }

    shuffle(dataset.samples_mut(), rng);

    let len = dataset.len();
    let train_end = split_index(len, train_fraction);
    let test_start = match boundary {
        SplitBoundary::Exact => train_end,
        SplitBoundary::SkipBoundaryRow => (train_end + 1).min(len),
    };

    let mut samples = dataset.into_samples();
    let test = samples.split_off(test_start);
    samples.truncate(train_end);

    log::debug!(
        "Split {} samples into {} train / {} test ({:?})",
        len,
        samples.len(),
        test.len(),
        boundary
    );

    Ok((Dataset::from_samples(samples), Dataset::from_samples(test)))
}

// ==============================================================================
// Import / Export
// ==============================================================================

pub fn to_json(dataset: &Dataset) -> DatasetResult<String> {
    Ok(serde_json::to_string(dataset)?)
}

/// Parse a JSON array of samples and reject it if any row is malformed
pub fn from_json(json: &str, landmark_count: usize) -> DatasetResult<Dataset> {
    let dataset: Dataset = serde_json::from_str(json)?;
    dataset.validate(landmark_count)?;
    Ok(dataset)
}

pub fn load_file(path: &Path, landmark_count: usize) -> DatasetResult<Dataset> {
    let contents = std::fs::read_to_string(path)?;
    let dataset = from_json(&contents, landmark_count)?;
    log::info!("Loaded {} samples from {}", dataset.len(), path.display());
    Ok(dataset)
}

/// Load several recordings and merge them in the given order
pub fn load_files<P: AsRef<Path>>(paths: &[P], landmark_count: usize) -> DatasetResult<Dataset> {
    let mut merged = Dataset::new();
    for path in paths {
        let dataset = load_file(path.as_ref(), landmark_count)?;
        merged = merge(merged, dataset);
    }
    Ok(merged)
}

/// Write the dataset as JSON, creating parent directories as needed
pub fn export_to_file(dataset: &Dataset, path: &Path) -> DatasetResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    std::fs::write(path, to_json(dataset)?)?;
    log::info!("Exported {} samples to {}", dataset.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    fn numbered(n: usize) -> Dataset {
        Dataset::from_samples(
            (0..n)
                .map(|i| PoseSample::new(vec![i as f32], if i % 2 == 0 { "A" } else { "B" }))
                .collect(),
        )
    }

    fn ids(dataset: &Dataset) -> Vec<f32> {
        dataset.iter().map(|s| s.data[0]).collect()
    }

    #[test]
    fn test_flatten_order_and_determinism() {
        let landmarks = vec![
            Landmark::new(0.1, 0.2, 0.3),
            Landmark::new(0.4, 0.5, 0.6),
        ];

        let first = flatten(&landmarks);
        let second = flatten(&landmarks);

        assert_eq!(first, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(
            first.iter().map(|v| v.to_bits()).collect::<Vec<_>>(),
            second.iter().map(|v| v.to_bits()).collect::<Vec<_>>()
        );
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn test_build_sample() {
        let sample = build_sample(&[Landmark::new(1.0, 2.0, 3.0)], "handsUp");
        assert_eq!(sample.label, "handsUp");
        assert!(sample.is_well_formed(1));
    }

    #[test]
    fn test_merge_length_and_order() {
        let a = Dataset::from_samples(vec![
            PoseSample::new(vec![1.0], "a"),
            PoseSample::new(vec![2.0], "a"),
        ]);
        let b = Dataset::from_samples(vec![
            PoseSample::new(vec![3.0], "b"),
            PoseSample::new(vec![4.0], "b"),
            PoseSample::new(vec![5.0], "b"),
        ]);

        let merged = merge(a, b);
        assert_eq!(merged.len(), 5);
        assert_eq!(ids(&merged), vec![1.0, 2.0, 3.0, 4.0, 5.0]);

        assert_eq!(merge(Dataset::new(), Dataset::new()).len(), 0);
    }

    #[test]
    fn test_shuffle_is_permutation() {
        let mut items: Vec<usize> = (0..50).collect();
        let mut rng = StdRng::seed_from_u64(7);
        shuffle(&mut items, &mut rng);

        let mut sorted = items.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..50).collect::<Vec<_>>());
        assert_ne!(items, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_is_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut counts: HashMap<Vec<u8>, usize> = HashMap::new();

        for _ in 0..6000 {
            let mut items = vec![0u8, 1, 2];
            shuffle(&mut items, &mut rng);
            *counts.entry(items).or_insert(0) += 1;
        }

        assert_eq!(counts.len(), 6);
        for count in counts.values() {
            assert!((800..=1200).contains(count), "skewed permutation count {}", count);
        }
    }

    #[test]
    fn test_shuffle_split_reproducible() {
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);

        let (train_a, test_a) = shuffle_split(numbered(20), 0.8, SplitBoundary::Exact, &mut rng_a).unwrap();
        let (train_b, test_b) = shuffle_split(numbered(20), 0.8, SplitBoundary::Exact, &mut rng_b).unwrap();

        assert_eq!(ids(&train_a), ids(&train_b));
        assert_eq!(ids(&test_a), ids(&test_b));
    }

    #[test]
    fn test_shuffle_split_exact_partition() {
        let mut rng = StdRng::seed_from_u64(1);
        let (train, test) = shuffle_split(numbered(10), 0.8, SplitBoundary::Exact, &mut rng).unwrap();

        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 2);

        let mut all = ids(&train);
        all.extend(ids(&test));
        all.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(all, (0..10).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_shuffle_split_skip_boundary_row() {
        let mut rng = StdRng::seed_from_u64(1);
        let (train, test) =
            shuffle_split(numbered(10), 0.8, SplitBoundary::SkipBoundaryRow, &mut rng).unwrap();

        assert_eq!(train.len(), 8);
        assert_eq!(test.len(), 1);

        // Same seed, same shuffle: the skipped row is the first exact test row
        let mut rng = StdRng::seed_from_u64(1);
        let (_, exact_test) = shuffle_split(numbered(10), 0.8, SplitBoundary::Exact, &mut rng).unwrap();
        assert_eq!(ids(&test), ids(&exact_test)[1..].to_vec());
    }

    #[test]
    fn test_shuffle_split_edges() {
        let mut rng = StdRng::seed_from_u64(3);

        let (train, test) = shuffle_split(Dataset::new(), 0.8, SplitBoundary::SkipBoundaryRow, &mut rng).unwrap();
        assert!(train.is_empty());
        assert!(test.is_empty());

        let (train, test) = shuffle_split(numbered(4), 1.0, SplitBoundary::SkipBoundaryRow, &mut rng).unwrap();
        assert_eq!(train.len(), 4);
        assert!(test.is_empty());

        assert!(matches!(
            shuffle_split(numbered(4), 1.5, SplitBoundary::Exact, &mut rng),
            Err(DatasetError::InvalidFraction(_))
        ));
    }

    #[test]
    fn test_export_empty_dataset() {
        assert_eq!(to_json(&Dataset::new()).unwrap(), "[]");
    }

    #[test]
    fn test_from_json_rejects_malformed_rows() {
        let json = r#"[{"data":[0,0,0],"label":"a"},{"data":[0,0],"label":"b"}]"#;
        assert!(matches!(
            from_json(json, 1),
            Err(DatasetError::MalformedSample { index: 1, .. })
        ));
        assert!(matches!(from_json("not json", 1), Err(DatasetError::Json(_))));
    }

    #[test]
    fn test_export_and_load_files() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("nested").join("first.json");
        let second = dir.path().join("second.json");

        let a = Dataset::from_samples(vec![PoseSample::new(vec![1.0, 2.0, 3.0], "handsUp")]);
        let b = Dataset::from_samples(vec![
            PoseSample::new(vec![4.0, 5.0, 6.0], "eyesCovered"),
            PoseSample::new(vec![7.0, 8.0, 9.0], "fakeSurprise"),
        ]);

        export_to_file(&a, &first).unwrap();
        export_to_file(&b, &second).unwrap();

        let loaded = load_files(&[first, second], 1).unwrap();
        assert_eq!(loaded.len(), 3);
        let labels: Vec<&str> = loaded.iter().map(|s| s.label.as_str()).collect();
        assert_eq!(labels, vec!["handsUp", "eyesCovered", "fakeSurprise"]);
    }
}
