//! Roster bookkeeping and the capture/recognition loop behind the Rollcall GUI.
//!
//! Face detection and recognition are delegated to OpenCV (enabled by the
//! default `opencv` feature). Everything else here is plain Rust so it can be
//! exercised with fake capabilities.

pub mod config;
pub mod error;
pub mod recognition;
pub mod roster;
pub mod session;
pub mod vision;

#[cfg(feature = "opencv")]
pub mod camera;
#[cfg(feature = "opencv")]
pub mod face;

pub use config::RollcallConfig;
pub use error::{Result, RollcallError};
pub use recognition::{
    Annotation, FrameReport, LoopEvent, LoopState, RecognitionController, RecognitionWorker,
    StopReason,
};
pub use roster::{Roster, RosterEntry};
pub use session::{display_accuracy, Counters, Session};
pub use vision::{CameraFrame, CameraOpener, FaceDetector, FaceRecognizer, FaceRegion, FrameSource, Prediction};

/// Builds a controller wired to the camera, cascade and LBPH model named in `config`.
///
/// Fails when either model file is missing or cannot be loaded.
#[cfg(feature = "opencv")]
pub fn opencv_controller(config: &RollcallConfig) -> Result<RecognitionController> {
    use std::sync::Arc;

    let detector = face::CascadeDetector::load(&config.detection)?;
    let recognizer = face::LbphRecognizer::load(&config.recognition)?;

    let camera_config = config.camera.clone();
    let opener = move || -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(camera::Camera::open(&camera_config)?))
    };

    Ok(RecognitionController::new(
        Box::new(detector),
        Box::new(recognizer),
        Arc::new(opener),
        config.ui.channel_capacity,
    ))
}
