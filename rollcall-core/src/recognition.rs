//! Capture/recognition loop.
//!
//! The loop runs on its own thread and never touches widgets. Everything the
//! UI needs is posted as a [`LoopEvent`] on a bounded channel that the GTK
//! main loop drains.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info, trace, warn};

use crate::error::{Result, RollcallError};
use crate::roster::Roster;
use crate::session::{display_accuracy, Counters, Session};
use crate::vision::{CameraFrame, CameraOpener, FaceDetector, FaceRecognizer, FaceRegion, FrameSource};

const GRAB_FAILURE_PAUSE: Duration = Duration::from_millis(10);

pub type SharedDetector = Arc<Mutex<Box<dyn FaceDetector>>>;
pub type SharedRecognizer = Arc<Mutex<Box<dyn FaceRecognizer>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub region: FaceRegion,
    pub name: String,
    pub accuracy: f64,
}

impl Annotation {
    pub fn label(&self) -> String {
        format!("{} ({:.2}%)", self.name, self.accuracy)
    }
}

#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame: CameraFrame,
    pub annotations: Vec<Annotation>,
    pub recognized: BTreeSet<String>,
    pub counters: Counters,
    /// Accuracy of the last face recognized in this frame, if any.
    pub accuracy: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    Failed(String),
    Disconnected,
}

#[derive(Debug, Clone)]
pub enum LoopEvent {
    Frame(FrameReport),
    Finished(StopReason),
}

/// Per-run state: detects, recognizes and keeps the recognized-set.
pub struct RecognitionWorker {
    detector: SharedDetector,
    recognizer: SharedRecognizer,
    roster: Arc<Roster>,
    session: Session,
}

impl RecognitionWorker {
    pub fn new(detector: SharedDetector, recognizer: SharedRecognizer, roster: Arc<Roster>) -> Self {
        let session = Session::new(roster.len());
        Self {
            detector,
            recognizer,
            roster,
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Runs detection and recognition on one frame.
    ///
    /// Labels that are not on the roster are skipped. Detector and
    /// recognizer errors are returned to the caller.
    pub fn process(&mut self, frame: CameraFrame) -> Result<FrameReport> {
        let regions = lock(&self.detector).detect(&frame)?;

        let mut annotations = Vec::new();
        let mut accuracy = None;

        for region in regions {
            let prediction = lock(&self.recognizer).predict(&frame, &region)?;

            let Some(name) = self.roster.lookup(prediction.label) else {
                trace!("Label {} not on roster, skipping", prediction.label);
                continue;
            };

            if self.session.record(name) {
                info!("Recognized {}", name);
            }

            let face_accuracy = display_accuracy(prediction.distance);
            accuracy = Some(face_accuracy);
            annotations.push(Annotation {
                region,
                name: name.to_string(),
                accuracy: face_accuracy,
            });
        }

        Ok(FrameReport {
            frame,
            annotations,
            recognized: self.session.recognized().clone(),
            counters: self.session.counters(),
            accuracy,
        })
    }
}

struct RunningLoop {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
    tx: Sender<LoopEvent>,
}

impl RunningLoop {
    fn is_active(&self) -> bool {
        !self.stop.load(Ordering::SeqCst) && !self.handle.is_finished()
    }

    /// Closes the channel so a thread blocked on a full channel can exit, then joins it.
    fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.tx.close();
        join_loop(self.handle);
    }
}

/// Owns the capabilities and the background thread; drives IDLE/RUNNING.
pub struct RecognitionController {
    detector: SharedDetector,
    recognizer: SharedRecognizer,
    camera: Arc<dyn CameraOpener>,
    channel_capacity: usize,
    running: Option<RunningLoop>,
    draining: Option<RunningLoop>,
}

impl std::fmt::Debug for RecognitionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecognitionController")
            .field("state", &self.state())
            .field("channel_capacity", &self.channel_capacity)
            .finish()
    }
}

impl RecognitionController {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        recognizer: Box<dyn FaceRecognizer>,
        camera: Arc<dyn CameraOpener>,
        channel_capacity: usize,
    ) -> Self {
        Self {
            detector: Arc::new(Mutex::new(detector)),
            recognizer: Arc::new(Mutex::new(recognizer)),
            camera,
            channel_capacity: channel_capacity.max(1),
            running: None,
            draining: None,
        }
    }

    pub fn state(&self) -> LoopState {
        match &self.running {
            Some(run) if run.is_active() => LoopState::Running,
            _ => LoopState::Idle,
        }
    }

    /// Starts a fresh run against `roster` and returns its event stream.
    pub fn start(&mut self, roster: Arc<Roster>) -> Result<Receiver<LoopEvent>> {
        if roster.is_empty() {
            return Err(RollcallError::RosterNotLoaded);
        }
        if self.state() == LoopState::Running {
            return Err(RollcallError::AlreadyRunning);
        }

        // The previous thread must have released the camera before we reopen it.
        // The previous run's receiver may still be held undrained by the caller.
        if let Some(run) = self.running.take() {
            run.shutdown();
        }
        if let Some(run) = self.draining.take() {
            run.shutdown();
        }

        let (tx, rx) = async_channel::bounded(self.channel_capacity);
        let stop = Arc::new(AtomicBool::new(false));
        let worker = RecognitionWorker::new(self.detector.clone(), self.recognizer.clone(), roster);
        let camera = self.camera.clone();
        let thread_stop = stop.clone();
        let thread_tx = tx.clone();

        let handle = thread::Builder::new()
            .name("recognition".to_string())
            .spawn(move || run_loop(worker, camera, thread_stop, thread_tx))
            .map_err(RollcallError::Spawn)?;

        info!("Recognition started");
        self.running = Some(RunningLoop { stop, handle, tx });
        Ok(rx)
    }

    /// Asks the loop to exit after its current iteration. No-op when idle.
    pub fn stop(&mut self) -> bool {
        let Some(run) = self.running.take() else {
            return false;
        };
        let was_active = run.is_active();
        run.stop.store(true, Ordering::SeqCst);
        self.draining = Some(run);
        if was_active {
            info!("Recognition stop requested");
        }
        was_active
    }
}

impl Drop for RecognitionController {
    fn drop(&mut self) {
        self.stop();
        if let Some(run) = self.draining.take() {
            run.shutdown();
        }
    }
}

fn join_loop(handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!("Recognition thread panicked");
    }
}

fn run_loop(
    mut worker: RecognitionWorker,
    camera: Arc<dyn CameraOpener>,
    stop: Arc<AtomicBool>,
    tx: Sender<LoopEvent>,
) {
    let reason = match camera.open() {
        Ok(mut source) => {
            let reason = capture(&mut worker, source.as_mut(), &stop, &tx);
            drop(source);
            reason
        }
        Err(e) => {
            error!("Failed to open camera: {}", e);
            StopReason::Failed(e.to_string())
        }
    };

    let counters = worker.session().counters();
    let elapsed = chrono::Utc::now() - worker.session().started_at();
    info!(
        "Recognition finished ({:?}) after {}s: {}",
        reason,
        elapsed.num_seconds(),
        counters
    );

    let _ = tx.send_blocking(LoopEvent::Finished(reason));
}

fn capture(
    worker: &mut RecognitionWorker,
    source: &mut dyn FrameSource,
    stop: &AtomicBool,
    tx: &Sender<LoopEvent>,
) -> StopReason {
    while !stop.load(Ordering::SeqCst) {
        let frame = match source.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                debug!("Skipping frame: {}", e);
                thread::sleep(GRAB_FAILURE_PAUSE);
                continue;
            }
        };

        let report = match worker.process(frame) {
            Ok(report) => report,
            Err(e) => {
                warn!("Recognition failed: {}", e);
                return StopReason::Failed(e.to_string());
            }
        };

        match tx.try_send(LoopEvent::Frame(report)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!("UI busy, dropping frame"),
            Err(TrySendError::Closed(_)) => return StopReason::Disconnected,
        }
    }
    StopReason::Requested
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::Prediction;

    struct FixedDetector(Vec<FaceRegion>);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &CameraFrame) -> Result<Vec<FaceRegion>> {
            Ok(self.0.clone())
        }
    }

    /// Predicts the label stored in the region's `x` coordinate.
    struct LabelFromX;

    impl FaceRecognizer for LabelFromX {
        fn predict(&mut self, _frame: &CameraFrame, region: &FaceRegion) -> Result<Prediction> {
            Ok(Prediction { label: region.x, distance: region.y as f64 })
        }
    }

    fn frame() -> CameraFrame {
        CameraFrame { rgb_data: vec![0; 12], width: 2, height: 2 }
    }

    fn roster() -> Arc<Roster> {
        Arc::new(Roster::from_reader("id,name\n1,Ada\n2,Lin\n3,Grace\n".as_bytes()).unwrap())
    }

    fn worker(regions: Vec<FaceRegion>) -> RecognitionWorker {
        let detector: Box<dyn FaceDetector> = Box::new(FixedDetector(regions));
        let recognizer: Box<dyn FaceRecognizer> = Box::new(LabelFromX);
        RecognitionWorker::new(
            Arc::new(Mutex::new(detector)),
            Arc::new(Mutex::new(recognizer)),
            roster(),
        )
    }

    #[test]
    fn test_known_faces_are_counted() {
        let mut worker = worker(vec![FaceRegion::new(1, 20, 10, 10), FaceRegion::new(3, 5, 10, 10)]);
        let report = worker.process(frame()).unwrap();

        assert_eq!(report.counters, Counters { recognized: 2, remaining: 1 });
        assert_eq!(report.annotations.len(), 2);
        assert_eq!(report.annotations[0].label(), "Ada (80.00%)");
        assert_eq!(report.accuracy, Some(95.0));
        assert!(report.recognized.contains("Grace"));
    }

    #[test]
    fn test_same_face_twice_counts_once() {
        let mut worker = worker(vec![FaceRegion::new(2, 0, 10, 10)]);
        worker.process(frame()).unwrap();
        let report = worker.process(frame()).unwrap();
        assert_eq!(report.counters, Counters { recognized: 1, remaining: 2 });
    }

    #[test]
    fn test_unknown_label_changes_nothing() {
        let mut worker = worker(vec![FaceRegion::new(-1, 0, 10, 10), FaceRegion::new(99, 0, 10, 10)]);
        let report = worker.process(frame()).unwrap();
        assert!(report.annotations.is_empty());
        assert!(report.recognized.is_empty());
        assert_eq!(report.accuracy, None);
        assert_eq!(report.counters, Counters { recognized: 0, remaining: 3 });
    }

    #[test]
    fn test_large_distance_clamps_to_zero() {
        let mut worker = worker(vec![FaceRegion::new(1, 180, 10, 10)]);
        let report = worker.process(frame()).unwrap();
        assert_eq!(report.accuracy, Some(0.0));
        assert_eq!(report.annotations[0].label(), "Ada (0.00%)");
    }
}
