//! Seams between the recognition loop and the vision library.
//!
//! The loop only sees these traits; the OpenCV implementations live in
//! [`crate::camera`] and [`crate::face`].

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub rgb_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CameraFrame {
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgb_data.len() == self.width as usize * self.height as usize * 3
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRegion {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRegion {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// The part of this region inside a `width`x`height` frame, or `None` if nothing is left.
    pub fn clamped(&self, width: i32, height: i32) -> Option<FaceRegion> {
        let x = self.x.clamp(0, width);
        let y = self.y.clamp(0, height);
        let right = self.x.saturating_add(self.width).min(width);
        let bottom = self.y.saturating_add(self.height).min(height);
        if right <= x || bottom <= y {
            return None;
        }
        Some(FaceRegion::new(x, y, right - x, bottom - y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: i32,
    /// Dissimilarity to the closest training sample; lower is a better match.
    pub distance: f64,
}

pub trait FrameSource: Send {
    fn read_frame(&mut self) -> Result<CameraFrame>;
}

pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<FaceRegion>>;
}

pub trait FaceRecognizer: Send {
    fn predict(&mut self, frame: &CameraFrame, region: &FaceRegion) -> Result<Prediction>;
}

/// Opens the camera on the recognition thread when a run starts.
pub trait CameraOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn FrameSource>>;
}

impl<F> CameraOpener for F
where
    F: Fn() -> Result<Box<dyn FrameSource>> + Send + Sync,
{
    fn open(&self) -> Result<Box<dyn FrameSource>> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamped_inside_frame_is_unchanged() {
        let region = FaceRegion::new(10, 20, 30, 40);
        assert_eq!(region.clamped(640, 480), Some(region));
    }

    #[test]
    fn test_clamped_trims_overhang() {
        let region = FaceRegion::new(600, 450, 100, 100);
        assert_eq!(region.clamped(640, 480), Some(FaceRegion::new(600, 450, 40, 30)));
    }

    #[test]
    fn test_clamped_negative_origin_keeps_far_edge() {
        let region = FaceRegion::new(-10, -5, 50, 25);
        assert_eq!(region.clamped(640, 480), Some(FaceRegion::new(0, 0, 40, 20)));
    }

    #[test]
    fn test_clamped_outside_frame() {
        assert_eq!(FaceRegion::new(700, 10, 20, 20).clamped(640, 480), None);
        assert_eq!(FaceRegion::new(-30, 10, 20, 20).clamped(640, 480), None);
        assert_eq!(FaceRegion::new(10, 10, 0, 20).clamped(640, 480), None);
    }
}
