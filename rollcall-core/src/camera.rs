use opencv::prelude::*;
use opencv::core::Mat;
use opencv::videoio::{self, VideoCapture, CAP_ANY};
use log::{info, warn};

use crate::config::CameraConfig;
use crate::error::{Result, RollcallError};
use crate::vision::{CameraFrame, FrameSource};

pub struct Camera {
    cap: VideoCapture,
    device_index: i32,
}

impl Camera {
    pub fn open(config: &CameraConfig) -> Result<Self> {
        let mut cap = VideoCapture::new(config.device_index, CAP_ANY)
            .map_err(|e| RollcallError::Camera(format!("Failed to open camera: {}", e)))?;

        if !cap.is_opened().unwrap_or(false) {
            return Err(RollcallError::Camera(format!(
                "Camera {} not opened",
                config.device_index
            )));
        }

        cap.set(videoio::CAP_PROP_FRAME_WIDTH, config.frame_width as f64).ok();
        cap.set(videoio::CAP_PROP_FRAME_HEIGHT, config.frame_height as f64).ok();

        info!("Opened camera {}", config.device_index);
        Ok(Self {
            cap,
            device_index: config.device_index,
        })
    }
}

impl FrameSource for Camera {
    fn read_frame(&mut self) -> Result<CameraFrame> {
        let mut mat = Mat::default();
        self.cap.read(&mut mat)
            .map_err(|e| RollcallError::Camera(format!("Failed to read frame: {}", e)))?;

        if mat.empty() {
            return Err(RollcallError::Camera("Empty frame".to_string()));
        }

        let mut rgb_mat = Mat::default();
        opencv::imgproc::cvt_color(&mat, &mut rgb_mat, opencv::imgproc::COLOR_BGR2RGB, 0)?;

        let width = rgb_mat.cols() as u32;
        let height = rgb_mat.rows() as u32;
        let rgb_data = rgb_mat.data_bytes()?.to_vec();

        Ok(CameraFrame {
            rgb_data,
            width,
            height,
        })
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.cap.release() {
            warn!("Failed to release camera {}: {}", self.device_index, e);
        } else {
            info!("Released camera {}", self.device_index);
        }
    }
}
