use opencv::prelude::*;
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc;
use opencv::objdetect::CascadeClassifier;
use log::{debug, info};

use crate::config::{DetectionConfig, RecognitionConfig};
use crate::error::{Result, RollcallError};
use crate::vision::{CameraFrame, FaceDetector, FaceRecognizer, FaceRegion, Prediction};

fn path_str(path: &std::path::Path) -> Result<&str> {
    if !path.exists() {
        return Err(RollcallError::ModelMissing(path.to_path_buf()));
    }
    path.to_str()
        .ok_or_else(|| RollcallError::Vision(format!("Non UTF-8 model path {:?}", path)))
}

fn check_frame(frame: &CameraFrame) -> Result<()> {
    if !frame.is_valid() {
        return Err(RollcallError::Vision(format!(
            "Invalid frame: {} bytes for {}x{}",
            frame.rgb_data.len(), frame.width, frame.height
        )));
    }
    Ok(())
}

/// Haar cascade face detector.
pub struct CascadeDetector {
    classifier: CascadeClassifier,
    scale_factor: f64,
    min_neighbors: i32,
}

impl CascadeDetector {
    pub fn load(config: &DetectionConfig) -> Result<Self> {
        let path = path_str(&config.cascade_path)?;
        let classifier = CascadeClassifier::new(path)?;
        if classifier.empty()? {
            return Err(RollcallError::Vision(format!("Cascade {:?} is empty", config.cascade_path)));
        }
        info!("Loaded face cascade from {:?}", config.cascade_path);

        Ok(Self {
            classifier,
            scale_factor: config.scale_factor,
            min_neighbors: config.min_neighbors,
        })
    }
}

impl FaceDetector for CascadeDetector {
    fn detect(&mut self, frame: &CameraFrame) -> Result<Vec<FaceRegion>> {
        check_frame(frame)?;
        let flat = Mat::from_slice(&frame.rgb_data)?;
        let rgb = flat.reshape(3, frame.height as i32)?;

        let mut gray = Mat::default();
        imgproc::cvt_color(&*rgb, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;

        let mut faces = Vector::<Rect>::new();
        self.classifier.detect_multi_scale(
            &gray,
            &mut faces,
            self.scale_factor,
            self.min_neighbors,
            0,
            Size::default(),
            Size::default(),
        )?;

        if !faces.is_empty() {
            debug!("Detected {} face(s)", faces.len());
        }

        Ok(faces
            .iter()
            .map(|r| FaceRegion::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}

/// LBPH recognizer loaded from a trained model file.
pub struct LbphRecognizer {
    model: opencv::core::Ptr<opencv::face::LBPHFaceRecognizer>,
    face_size: i32,
}

impl LbphRecognizer {
    pub fn load(config: &RecognitionConfig) -> Result<Self> {
        let path = path_str(&config.model_path)?;
        let mut model = opencv::face::LBPHFaceRecognizer::create(1, 8, 8, 8, config.threshold)?;
        opencv::face::FaceRecognizerTrait::read(&mut model, path)?;
        info!("Loaded LBPH model from {:?} (threshold {})", config.model_path, config.threshold);

        Ok(Self {
            model,
            face_size: config.face_size,
        })
    }
}

impl FaceRecognizer for LbphRecognizer {
    fn predict(&mut self, frame: &CameraFrame, region: &FaceRegion) -> Result<Prediction> {
        check_frame(frame)?;
        let flat = Mat::from_slice(&frame.rgb_data)?;
        let rgb = flat.reshape(3, frame.height as i32)?;
        let crop = region
            .clamped(rgb.cols(), rgb.rows())
            .ok_or_else(|| RollcallError::Vision(format!("Face region {:?} outside frame", region)))?;

        // Only the face is converted, not the whole frame.
        let roi = Mat::roi(&*rgb, Rect::new(crop.x, crop.y, crop.width, crop.height))?;
        let mut gray = Mat::default();
        imgproc::cvt_color(&*roi, &mut gray, imgproc::COLOR_RGB2GRAY, 0)?;

        let mut face = Mat::default();
        imgproc::resize(
            &gray,
            &mut face,
            Size::new(self.face_size, self.face_size),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;

        let mut label = -1;
        let mut distance = 0.0;
        self.model.predict(&face, &mut label, &mut distance)?;
        debug!("Predicted label {} (distance {:.2})", label, distance);

        Ok(Prediction { label, distance })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIDE: i32 = 220;

    fn stripes(x: i32, _y: i32) -> u8 {
        if (x / 10) % 2 == 0 { 255 } else { 0 }
    }

    fn checkers(x: i32, y: i32) -> u8 {
        if (x / 10 + y / 10) % 2 == 0 { 255 } else { 0 }
    }

    fn gray_face(pattern: fn(i32, i32) -> u8) -> Mat {
        let data: Vec<u8> = (0..SIDE)
            .flat_map(|y| (0..SIDE).map(move |x| pattern(x, y)))
            .collect();
        Mat::from_slice(&data)
            .unwrap()
            .reshape(1, SIDE)
            .unwrap()
            .try_clone()
            .unwrap()
    }

    /// A 320x240 mid-gray frame with `pattern` painted inside `region`.
    fn frame_with(pattern: fn(i32, i32) -> u8, region: FaceRegion) -> CameraFrame {
        let (width, height) = (320, 240);
        let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                let inside = x >= region.x
                    && x < region.x + region.width
                    && y >= region.y
                    && y < region.y + region.height;
                let v = if inside { pattern(x - region.x, y - region.y) } else { 128 };
                rgb_data.extend_from_slice(&[v, v, v]);
            }
        }
        CameraFrame { rgb_data, width: width as u32, height: height as u32 }
    }

    fn trained() -> LbphRecognizer {
        let mut model = opencv::face::LBPHFaceRecognizer::create(1, 8, 8, 8, f64::MAX).unwrap();
        let images = Vector::<Mat>::from_iter([gray_face(stripes), gray_face(checkers)]);
        let labels = Vector::<i32>::from_iter([7, 9]);
        opencv::face::FaceRecognizerTrait::train(&mut model, &images, &labels).unwrap();
        LbphRecognizer { model, face_size: SIDE }
    }

    #[test]
    fn test_predict_uses_only_the_face_region() {
        let mut recognizer = trained();
        let region = FaceRegion::new(60, 10, SIDE, SIDE);

        let prediction = recognizer.predict(&frame_with(stripes, region), &region).unwrap();
        assert_eq!(prediction.label, 7);

        let prediction = recognizer.predict(&frame_with(checkers, region), &region).unwrap();
        assert_eq!(prediction.label, 9);
    }

    #[test]
    fn test_predict_rejects_region_outside_frame() {
        let mut recognizer = trained();
        let region = FaceRegion::new(60, 10, SIDE, SIDE);
        let frame = frame_with(stripes, region);

        let err = recognizer
            .predict(&frame, &FaceRegion::new(400, 10, 50, 50))
            .unwrap_err();
        assert!(matches!(err, RollcallError::Vision(_)));
    }

    #[test]
    fn test_invalid_frame_is_rejected() {
        let mut recognizer = trained();
        let frame = CameraFrame { rgb_data: vec![0; 10], width: 4, height: 4 };
        assert!(recognizer.predict(&frame, &FaceRegion::new(0, 0, 2, 2)).is_err());
    }
}
