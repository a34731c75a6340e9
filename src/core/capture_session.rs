// Capture session state machine
// Countdown, timed frame sampling and finalization for one pose label

use crate::core::dataset::build_sample;
use crate::core::video_capture::CaptureDevice;
use crate::models::capture::{CaptureError, CaptureResult, Frame};
use crate::models::dataset::Dataset;
use crate::models::pose::{Landmark, PoseError, PoseSample};
use crate::platform::pose::PoseDetector;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

// ==============================================================================
// Configuration
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureTimings {
    pub countdown_ms: u64,           // Default: 3000
    pub sample_interval_ms: u64,     // Default: 50
    pub collection_duration_ms: u64, // Default: 4000
    pub test_delay_ms: u64,          // Default: 2000
}

impl Default for CaptureTimings {
    fn default() -> Self {
        Self {
            countdown_ms: 3000,
            sample_interval_ms: 50,
            collection_duration_ms: 4000,
            test_delay_ms: 2000,
        }
    }
}

impl CaptureTimings {
    pub fn countdown(&self) -> Duration {
        Duration::from_millis(self.countdown_ms)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn collection_duration(&self) -> Duration {
        Duration::from_millis(self.collection_duration_ms)
    }

    pub fn test_delay(&self) -> Duration {
        Duration::from_millis(self.test_delay_ms)
    }

    /// Reject schedules the sampling loop cannot run
    pub fn validate(&self) -> CaptureResult<()> {
        if self.countdown_ms == 0 || self.sample_interval_ms == 0 || self.collection_duration_ms == 0 {
            return Err(CaptureError::InvalidTimings(
                "countdown, sample interval and collection window must be greater than zero".to_string(),
            ));
        }

        if self.sample_interval_ms >= self.collection_duration_ms {
            return Err(CaptureError::InvalidTimings(format!(
                "sample interval {} ms must be shorter than the collection window {} ms",
                self.sample_interval_ms, self.collection_duration_ms
            )));
        }

        Ok(())
    }
}

// ==============================================================================
// Session Types
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapturePhase {
    Idle,
    ArmedCountdown,
    Collecting,
    Finalizing,
}

impl CapturePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CapturePhase::Idle => "idle",
            CapturePhase::ArmedCountdown => "armed_countdown",
            CapturePhase::Collecting => "collecting",
            CapturePhase::Finalizing => "finalizing",
        }
    }
}

/// The label being recorded and its scheduled phase timestamps (ms since epoch)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSession {
    pub id: String,
    pub label: String,
    pub armed_at: i64,
    pub collect_at: i64,
    pub stop_at: i64,
}

impl CaptureSession {
    fn schedule(label: &str, timings: &CaptureTimings) -> Self {
        let armed_at = chrono::Utc::now().timestamp_millis();
        let collect_at = armed_at + timings.countdown_ms as i64;
        Self {
            id: Uuid::new_v4().to_string(),
            label: label.to_string(),
            armed_at,
            collect_at,
            stop_at: collect_at + timings.collection_duration_ms as i64,
        }
    }
}

/// Result of a finalized session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub session_id: String,
    pub label: String,
    pub frames: usize,
    pub samples: usize,
}

/// Snapshot for the command surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureStatus {
    pub phase: CapturePhase,
    pub session: Option<CaptureSession>,
    pub buffered_frames: usize,
    pub dataset_len: usize,
    pub device_running: bool,
    pub testing: bool,
    pub last_outcome: Option<SessionOutcome>,
}

// ==============================================================================
// Sample Buffer
// ==============================================================================

/// Frames collected during the current collection window
#[derive(Debug, Default)]
pub struct SampleBuffer {
    frames: Vec<Frame>,
}

impl SampleBuffer {
    pub fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    /// Hand the frames over for extraction, leaving the buffer empty
    pub fn take(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.frames)
    }
}

// ==============================================================================
// Pose Extraction
// ==============================================================================

/// Run the detector over every frame and build samples for the detections.
///
/// Frames without a pose are skipped. Detections with the wrong number of
/// landmarks and per-frame detector failures are logged and skipped.
pub async fn extract_samples(
    detector: &dyn PoseDetector,
    frames: &[Frame],
    label: &str,
) -> Vec<PoseSample> {
    let expected = detector.landmark_count();
    let mut samples = Vec::with_capacity(frames.len());

    for frame in frames {
        match detector.detect(frame).await {
            Ok(Some(landmarks)) if landmarks.len() == expected => {
                samples.push(build_sample(&landmarks, label));
            }
            Ok(Some(landmarks)) => {
                log::warn!(
                    "Rejected detection at {}: {}",
                    frame.timestamp,
                    PoseError::LandmarkCountMismatch {
                        expected,
                        actual: landmarks.len(),
                    }
                );
            }
            Ok(None) => log::debug!("No pose in frame at {}", frame.timestamp),
            Err(e) => log::warn!("Pose detection failed for frame at {}: {}", frame.timestamp, e),
        }
    }

    samples
}

// ==============================================================================
// Capture Controller
// ==============================================================================

struct CaptureState {
    phase: CapturePhase,
    session: Option<CaptureSession>,
    buffer: SampleBuffer,
    generation: u64,
    task: Option<JoinHandle<()>>,
    last_outcome: Option<SessionOutcome>,
}

fn set_phase(state: &mut CaptureState, phase_tx: &watch::Sender<CapturePhase>, phase: CapturePhase) {
    log::debug!("Capture phase {} -> {}", state.phase.as_str(), phase.as_str());
    state.phase = phase;
    phase_tx.send_replace(phase);
}

/// Clears the test-detection flag however the detection ends
struct TestDetectionGuard<'a>(&'a AtomicBool);

impl Drop for TestDetectionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Owns the capture device, the sample buffer and the single scheduled task
/// of the active session.
///
/// Every new session (and every cancellation) aborts the previous task and
/// bumps a generation counter. Tasks re-check the generation under the state
/// lock before each mutation, so a stale task can never touch a newer
/// session's buffer or phase. A running test detection holds the device
/// until it finishes; label selection is refused meanwhile.
pub struct CaptureController {
    state: Arc<Mutex<CaptureState>>,
    phase_tx: Arc<watch::Sender<CapturePhase>>,
    device: Arc<CaptureDevice>,
    detector: Arc<dyn PoseDetector>,
    dataset: Arc<RwLock<Dataset>>,
    timings: CaptureTimings,
    testing: AtomicBool,
}

impl CaptureController {
    pub fn new(
        device: Arc<CaptureDevice>,
        detector: Arc<dyn PoseDetector>,
        dataset: Arc<RwLock<Dataset>>,
        timings: CaptureTimings,
    ) -> CaptureResult<Self> {
        timings.validate()?;

        let (phase_tx, _) = watch::channel(CapturePhase::Idle);
        Ok(Self {
            state: Arc::new(Mutex::new(CaptureState {
                phase: CapturePhase::Idle,
                session: None,
                buffer: SampleBuffer::default(),
                generation: 0,
                task: None,
                last_outcome: None,
            })),
            phase_tx: Arc::new(phase_tx),
            device,
            detector,
            dataset,
            timings,
            testing: AtomicBool::new(false),
        })
    }

    pub fn dataset(&self) -> Arc<RwLock<Dataset>> {
        self.dataset.clone()
    }

    pub async fn start_device(&self) -> CaptureResult<()> {
        self.device.start().await
    }

    /// Stop the device. An armed or collecting session is discarded
    /// without finalizing.
    pub async fn stop_device(&self) -> CaptureResult<()> {
        {
            let mut state = self.state.lock().await;
            self.cancel_locked(&mut state, "capture device stopped");
        }
        self.device.stop().await
    }

    /// Begin a capture session for `label`, replacing any session in flight
    pub async fn select_label(&self, label: &str) -> CaptureResult<CaptureSession> {
        let label = label.trim();
        if label.is_empty() {
            return Err(CaptureError::InvalidLabel("label cannot be empty".to_string()));
        }

        if !self.device.is_running().await {
            return Err(CaptureError::NotCapturing);
        }

        let mut state = self.state.lock().await;
        if self.testing.load(Ordering::SeqCst) {
            return Err(CaptureError::SessionInProgress);
        }
        self.cancel_locked(&mut state, "new label selected");

        let session = CaptureSession::schedule(label, &self.timings);
        state.session = Some(session.clone());
        set_phase(&mut state, &self.phase_tx, CapturePhase::ArmedCountdown);

        let runner = SessionRunner {
            state: self.state.clone(),
            phase_tx: self.phase_tx.clone(),
            device: self.device.clone(),
            detector: self.detector.clone(),
            dataset: self.dataset.clone(),
            timings: self.timings,
            generation: state.generation,
            session: session.clone(),
        };
        state.task = Some(tokio::spawn(runner.run()));

        log::info!("Prepare to pose: '{}' (session {})", label, session.id);
        Ok(session)
    }

    /// Cancel the armed or collecting session, if any
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        self.cancel_locked(&mut state, "cancelled")
    }

    fn cancel_locked(&self, state: &mut CaptureState, reason: &str) -> bool {
        let task = state.task.take();
        let had_task = task.is_some();
        if let Some(task) = task {
            task.abort();
        }

        state.generation += 1;
        let discarded = state.buffer.len();
        state.buffer.clear();

        let session = state.session.take();
        let was_finalizing = state.phase == CapturePhase::Finalizing;
        if state.phase != CapturePhase::Idle {
            set_phase(state, &self.phase_tx, CapturePhase::Idle);
        }

        if let Some(session) = &session {
            if was_finalizing {
                log::info!("Capture of '{}' keeps finalizing in the background", session.label);
                return true;
            }
            log::info!(
                "Cancelled capture of '{}' ({}); discarded {} buffered frames",
                session.label,
                reason,
                discarded
            );
        }

        had_task || session.is_some()
    }

    pub fn phase(&self) -> CapturePhase {
        *self.phase_tx.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<CapturePhase> {
        self.phase_tx.subscribe()
    }

    /// Resolve once the controller is back in `Idle`
    pub async fn wait_until_idle(&self) {
        let mut rx = self.subscribe_phase();
        let _ = rx.wait_for(|phase| *phase == CapturePhase::Idle).await;
    }

    pub async fn status(&self) -> CaptureStatus {
        let device_running = self.device.is_running().await;
        let dataset_len = self.dataset.read().await.len();
        let state = self.state.lock().await;

        CaptureStatus {
            phase: state.phase,
            session: state.session.clone(),
            buffered_frames: state.buffer.len(),
            dataset_len,
            device_running,
            testing: self.testing.load(Ordering::SeqCst),
            last_outcome: state.last_outcome.clone(),
        }
    }

    /// Wait the test delay, grab one frame, detect a pose in it and stop the
    /// device. Returns `None` when no pose was found.
    pub async fn test_detection(&self) -> CaptureResult<Option<Vec<Landmark>>> {
        if !self.device.is_running().await {
            return Err(CaptureError::NotCapturing);
        }

        let _guard = {
            let state = self.state.lock().await;
            if state.phase != CapturePhase::Idle || self.testing.swap(true, Ordering::SeqCst) {
                return Err(CaptureError::SessionInProgress);
            }
            TestDetectionGuard(&self.testing)
        };

        time::sleep(self.timings.test_delay()).await;

        let frame = self.device.grab_frame().await?;
        let detection = self.detector.detect(&frame).await;
        self.stop_device().await?;

        match detection? {
            Some(landmarks) if landmarks.len() != self.detector.landmark_count() => {
                Err(PoseError::LandmarkCountMismatch {
                    expected: self.detector.landmark_count(),
                    actual: landmarks.len(),
                }
                .into())
            }
            Some(landmarks) => Ok(Some(landmarks)),
            None => {
                log::info!("Test detection found no pose");
                Ok(None)
            }
        }
    }
}

impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            if let Some(task) = state.task.take() {
                task.abort();
            }
        }
    }
}

// ==============================================================================
// Session Task
// ==============================================================================

struct SessionRunner {
    state: Arc<Mutex<CaptureState>>,
    phase_tx: Arc<watch::Sender<CapturePhase>>,
    device: Arc<CaptureDevice>,
    detector: Arc<dyn PoseDetector>,
    dataset: Arc<RwLock<Dataset>>,
    timings: CaptureTimings,
    generation: u64,
    session: CaptureSession,
}

impl SessionRunner {
    async fn run(self) {
        time::sleep(self.timings.countdown()).await;
        if !self.enter(CapturePhase::Collecting).await {
            return;
        }
        log::info!("Pose collection in progress for '{}'", self.session.label);

        let started = Instant::now();
        let cadence = self.timings.sample_interval();
        let mut ticker = time::interval_at(started + cadence, cadence);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let stop = time::sleep_until(started + self.timings.collection_duration());
        tokio::pin!(stop);

        loop {
            tokio::select! {
                biased;
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    if !self.collect_frame().await {
                        return;
                    }
                }
            }
        }

        let frames = match self.take_buffer().await {
            Some(frames) => frames,
            None => return,
        };

        // Detached: the frames are complete, so a new selection must not drop them
        let finalize = tokio::spawn(self.finalize(frames));
        let _ = finalize.await;
    }

    async fn enter(&self, phase: CapturePhase) -> bool {
        let mut state = self.state.lock().await;
        if state.generation != self.generation {
            return false;
        }
        set_phase(&mut state, &self.phase_tx, phase);
        true
    }

    async fn collect_frame(&self) -> bool {
        let frame = match self.device.grab_frame().await {
            Ok(frame) => Some(frame),
            Err(e) => {
                log::warn!("Missed sample for '{}': {}", self.session.label, e);
                None
            }
        };

        let mut state = self.state.lock().await;
        if state.generation != self.generation {
            return false;
        }
        if let Some(frame) = frame {
            state.buffer.push(frame);
        }
        true
    }

    async fn take_buffer(&self) -> Option<Vec<Frame>> {
        let mut state = self.state.lock().await;
        if state.generation != self.generation {
            return None;
        }
        set_phase(&mut state, &self.phase_tx, CapturePhase::Finalizing);
        Some(state.buffer.take())
    }

    async fn finalize(self, frames: Vec<Frame>) {
        let label = self.session.label.clone();
        let samples = extract_samples(self.detector.as_ref(), &frames, &label).await;

        let outcome = SessionOutcome {
            session_id: self.session.id.clone(),
            label: label.clone(),
            frames: frames.len(),
            samples: samples.len(),
        };
        drop(frames);

        let total = {
            let mut dataset = self.dataset.write().await;
            dataset.append(samples);
            dataset.len()
        };

        log::info!(
            "Done recording for '{}': {} of {} frames yielded a pose ({} samples in dataset)",
            label,
            outcome.samples,
            outcome.frames,
            total
        );

        let mut state = self.state.lock().await;
        state.last_outcome = Some(outcome);
        if state.generation == self.generation {
            state.session = None;
            state.task = None;
            set_phase(&mut state, &self.phase_tx, CapturePhase::Idle);
        }
    }
}
