pub mod core;
pub mod models;
pub mod platform;

use crate::core::capture_session::{CaptureController, CaptureSession, CaptureStatus};
use crate::core::classifier::{Classifier, DefaultClassifier};
use crate::core::config::Config;
use crate::core::dataset;
use crate::core::trainer::{self, TrainingRun};
use crate::core::video_capture::{CaptureDevice, VideoSource};
use crate::models::dataset::Dataset;
use crate::models::training::Prediction;
use crate::platform::pose::PoseDetector;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;

/// Builds a fresh, untrained classifier for every training run
pub type ClassifierFactory = Box<dyn Fn() -> Box<dyn Classifier> + Send + Sync>;

/// Initialize `env_logger`, honouring `RUST_LOG` and defaulting to `info`
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}

// Application state
pub struct PoseTrainerApp {
    pub config: Mutex<Config>,
    controller: CaptureController,
    classifier: RwLock<Option<Box<dyn Classifier>>>,
    new_classifier: ClassifierFactory,
}

impl PoseTrainerApp {
    /// Capture timings are read from `config` once, here; later config
    /// updates apply to them on the next app instance.
    pub fn new(
        config: Config,
        source: Box<dyn VideoSource>,
        detector: Arc<dyn PoseDetector>,
        new_classifier: ClassifierFactory,
    ) -> Result<Self, String> {
        let controller = CaptureController::new(
            Arc::new(CaptureDevice::new(source)),
            detector,
            Arc::new(RwLock::new(Dataset::new())),
            config.timings(),
        )
        .map_err(|e| format!("Failed to create capture controller: {}", e))?;

        Ok(Self {
            config: Mutex::new(config),
            controller,
            classifier: RwLock::new(None),
            new_classifier,
        })
    }

    /// Same as `new` with the default classifier backend
    pub fn with_default_classifier(
        config: Config,
        source: Box<dyn VideoSource>,
        detector: Arc<dyn PoseDetector>,
    ) -> Result<Self, String> {
        Self::new(
            config,
            source,
            detector,
            Box::new(|| Box::new(DefaultClassifier::new()) as Box<dyn Classifier>),
        )
    }

    pub fn controller(&self) -> &CaptureController {
        &self.controller
    }

    fn config_snapshot(&self) -> Result<Config, String> {
        self.config
            .lock()
            .map(|config| config.clone())
            .map_err(|e| format!("Failed to lock config: {}", e))
    }

    // Capture commands

    pub async fn start_device(&self) -> Result<(), String> {
        self.controller
            .start_device()
            .await
            .map_err(|e| format!("Failed to start capture device: {}", e))
    }

    pub async fn stop_device(&self) -> Result<(), String> {
        self.controller
            .stop_device()
            .await
            .map_err(|e| format!("Failed to stop capture device: {}", e))
    }

    pub async fn select_pose(&self, label: &str) -> Result<CaptureSession, String> {
        self.controller
            .select_label(label)
            .await
            .map_err(|e| format!("Failed to start capture: {}", e))
    }

    pub async fn cancel_capture(&self) -> bool {
        self.controller.cancel().await
    }

    pub async fn capture_status(&self) -> CaptureStatus {
        self.controller.status().await
    }

    /// Detect a pose in one delayed frame and classify it.
    ///
    /// Returns `None` when no pose was found.
    pub async fn test_detection(&self) -> Result<Option<Vec<Prediction>>, String> {
        if !self.is_trained().await {
            return Err("Classifier has not been trained".to_string());
        }

        let landmarks = self
            .controller
            .test_detection()
            .await
            .map_err(|e| format!("Test detection failed: {}", e))?;

        let landmarks = match landmarks {
            Some(landmarks) => landmarks,
            None => return Ok(None),
        };

        let classifier = self.classifier.read().await;
        let classifier = classifier
            .as_ref()
            .ok_or("Classifier has not been trained")?;
        let predictions = classifier
            .classify(&dataset::flatten(&landmarks))
            .await
            .map_err(|e| format!("Failed to classify pose: {}", e))?;

        if let Some(top) = predictions.first() {
            log::info!("Detected pose: {} ({:.2})", top.label, top.confidence);
        }
        Ok(Some(predictions))
    }

    // Dataset commands

    /// Write the captured dataset as JSON to `path`, or to the configured
    /// export location
    pub async fn export_dataset(&self, path: Option<&Path>) -> Result<PathBuf, String> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.config_snapshot()?.export_path(),
        };

        let dataset = self.controller.dataset();
        let dataset = dataset.read().await;
        dataset::export_to_file(&dataset, &path)
            .map_err(|e| format!("Failed to export dataset: {}", e))?;

        Ok(path)
    }

    /// Append recorded dataset files to the captured dataset. Returns the new
    /// dataset size.
    pub async fn load_datasets(&self, paths: &[PathBuf]) -> Result<usize, String> {
        let landmark_count = self.config_snapshot()?.landmark_count;
        let loaded = dataset::load_files(paths, landmark_count)
            .map_err(|e| format!("Failed to load datasets: {}", e))?;

        let dataset = self.controller.dataset();
        let mut dataset = dataset.write().await;
        dataset.append(loaded.into_samples());
        Ok(dataset.len())
    }

    // Training commands

    /// Shuffle, split, train and evaluate on the captured dataset
    pub async fn train_and_evaluate(&self) -> Result<TrainingRun, String> {
        let snapshot = self.controller.dataset().read().await.clone();
        self.train_on(snapshot).await
    }

    /// Train and evaluate on recorded files only, leaving the captured
    /// dataset untouched
    pub async fn bootstrap(&self, paths: &[PathBuf]) -> Result<TrainingRun, String> {
        let landmark_count = self.config_snapshot()?.landmark_count;
        let recorded = dataset::load_files(paths, landmark_count)
            .map_err(|e| format!("Failed to load datasets: {}", e))?;
        self.train_on(recorded).await
    }

    async fn train_on(&self, data: Dataset) -> Result<TrainingRun, String> {
        let config = self.config_snapshot()?;
        let mut rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut classifier = (self.new_classifier)();
        let run = trainer::train_and_evaluate(
            data,
            classifier.as_mut(),
            &config.training_config(),
            config.landmark_count,
            config.train_fraction,
            config.split_boundary,
            &mut rng,
        )
        .await
        .map_err(|e| format!("Training failed: {}", e))?;

        *self.classifier.write().await = Some(classifier);
        Ok(run)
    }

    pub async fn is_trained(&self) -> bool {
        self.classifier.read().await.is_some()
    }

    // Configuration management commands

    pub fn get_config(&self) -> Result<Config, String> {
        self.config_snapshot()
    }

    pub fn update_config(&self, config: Config) -> Result<(), String> {
        config
            .validate()
            .map_err(|e| format!("Invalid configuration: {}", e))?;

        let mut current_config = self
            .config
            .lock()
            .map_err(|e| format!("Failed to lock config: {}", e))?;

        *current_config = config.clone();

        config
            .save()
            .map_err(|e| format!("Failed to save config: {}", e))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video_capture::testing::FakeSource;
    use crate::models::pose::{Landmark, PoseSample};
    use crate::platform::pose::{NullPoseDetector, ReplayPoseDetector};

    fn test_config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.landmark_count = 1;
        config.shuffle_seed = Some(9);
        config.export_dir = dir.to_path_buf();
        config
    }

    fn write_recording(path: &Path) {
        let samples: Vec<PoseSample> = (0..10)
            .map(|i| {
                if i % 2 == 0 {
                    PoseSample::new(vec![0.1, 0.1, 0.1], "handsUp")
                } else {
                    PoseSample::new(vec![0.9, 0.9, 0.9], "eyesCovered")
                }
            })
            .collect();
        dataset::export_to_file(&Dataset::from_samples(samples), path).unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_then_test_detection() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("recording.json");
        write_recording(&recording);

        let detector = ReplayPoseDetector::new(vec![Some(vec![Landmark::new(0.85, 0.9, 0.95)])], 1).unwrap();
        let mut config = test_config(dir.path());
        config.test_delay_ms = 1;
        let app = PoseTrainerApp::with_default_classifier(
            config,
            Box::new(FakeSource::default()),
            Arc::new(detector),
        )
        .unwrap();

        app.start_device().await.unwrap();
        assert!(app.test_detection().await.is_err());

        let run = app.bootstrap(&[recording]).await.unwrap();
        assert_eq!((run.train_len, run.test_len), (8, 2));
        assert_eq!(run.report.accuracy, 1.0);
        assert!(app.is_trained().await);
        assert_eq!(app.capture_status().await.dataset_len, 0);

        let predictions = app.test_detection().await.unwrap().unwrap();
        assert_eq!(predictions[0].label, "eyesCovered");
        assert!(!app.capture_status().await.device_running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retraining_does_not_wait_for_test_detection() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("recording.json");
        write_recording(&recording);

        let detector = ReplayPoseDetector::new(vec![Some(vec![Landmark::new(0.1, 0.1, 0.1)])], 1).unwrap();
        let app = PoseTrainerApp::with_default_classifier(
            test_config(dir.path()),
            Box::new(FakeSource::default()),
            Arc::new(detector),
        )
        .unwrap();

        app.bootstrap(&[recording.clone()]).await.unwrap();
        app.start_device().await.unwrap();

        let start = tokio::time::Instant::now();
        let (detected, retrained_at) = tokio::join!(app.test_detection(), async {
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            app.bootstrap(&[recording.clone()]).await.unwrap();
            start.elapsed()
        });

        assert!(retrained_at < std::time::Duration::from_millis(2000));
        let predictions = detected.unwrap().unwrap();
        assert_eq!(predictions[0].label, "handsUp");
    }

    #[tokio::test]
    async fn test_rejects_unrunnable_timings() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.sample_interval_ms = 0;

        let err = PoseTrainerApp::with_default_classifier(
            config,
            Box::new(FakeSource::default()),
            Arc::new(NullPoseDetector),
        )
        .err()
        .unwrap();
        assert!(err.contains("Invalid capture timings"));
    }

    #[tokio::test]
    async fn test_load_train_and_export() {
        let dir = tempfile::tempdir().unwrap();
        let recording = dir.path().join("recording.json");
        write_recording(&recording);

        let app = PoseTrainerApp::with_default_classifier(
            test_config(dir.path()),
            Box::new(FakeSource::default()),
            Arc::new(NullPoseDetector),
        )
        .unwrap();

        assert!(app.train_and_evaluate().await.is_err());

        assert_eq!(app.load_datasets(&[recording.clone(), recording]).await.unwrap(), 20);
        let run = app.train_and_evaluate().await.unwrap();
        assert_eq!((run.train_len, run.test_len), (16, 4));

        let exported = app.export_dataset(None).await.unwrap();
        assert!(exported.ends_with("trainingData.json"));
        let reloaded = dataset::load_file(&exported, 1).unwrap();
        assert_eq!(reloaded.len(), 20);
    }

    #[tokio::test]
    async fn test_commands_report_errors_as_strings() {
        let dir = tempfile::tempdir().unwrap();
        let app = PoseTrainerApp::with_default_classifier(
            test_config(dir.path()),
            Box::new(FakeSource::refusing()),
            Arc::new(NullPoseDetector),
        )
        .unwrap();

        let err = app.start_device().await.unwrap_err();
        assert!(err.contains("Permission denied"));

        let err = app.select_pose("handsUp").await.unwrap_err();
        assert!(err.contains("not running"));

        let mut invalid = app.get_config().unwrap();
        invalid.epochs = 0;
        assert!(app.update_config(invalid).is_err());
    }
}
