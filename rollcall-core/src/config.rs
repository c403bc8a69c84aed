use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::Result;
use log::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollcallConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub recognition: RecognitionConfig,
    #[serde(default)]
    pub ui: UiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "default_device_index")]
    pub device_index: i32,
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_cascade_path")]
    pub cascade_path: PathBuf,
    #[serde(default = "default_scale_factor")]
    pub scale_factor: f64,
    #[serde(default = "default_min_neighbors")]
    pub min_neighbors: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognitionConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_face_size")]
    pub face_size: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    #[serde(default = "default_quit_key")]
    pub quit_key: char,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_device_index() -> i32 { 0 }
fn default_frame_width() -> u32 { 640 }
fn default_frame_height() -> u32 { 480 }
fn default_cascade_path() -> PathBuf { PathBuf::from("Classifiers/haarface.xml") }
fn default_scale_factor() -> f64 { 1.1 }
fn default_min_neighbors() -> i32 { 4 }
fn default_model_path() -> PathBuf { PathBuf::from("Classifiers/TrainedLBPH.yml") }
fn default_threshold() -> f64 { 500.0 }
fn default_face_size() -> i32 { 220 }
fn default_quit_key() -> char { 'q' }
fn default_channel_capacity() -> usize { 2 }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: default_device_index(),
            frame_width: default_frame_width(),
            frame_height: default_frame_height(),
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            cascade_path: default_cascade_path(),
            scale_factor: default_scale_factor(),
            min_neighbors: default_min_neighbors(),
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            threshold: default_threshold(),
            face_size: default_face_size(),
        }
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            quit_key: default_quit_key(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl RollcallConfig {
    /// Reads a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let config: RollcallConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// User config first, then the system one, then defaults.
    pub fn load_default() -> Self {
        for path in Self::search_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load(&path) {
                Ok(config) => {
                    info!("Using config {:?}", path);
                    return config;
                }
                Err(e) => warn!("Ignoring unreadable config {:?}: {}", path, e),
            }
        }
        Self::default()
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("rollcall").join("config.json"));
        }
        paths.push(PathBuf::from("/etc/rollcall/config.json"));
        paths
    }

    /// Model files that must be present before the application can start.
    pub fn model_paths(&self) -> [&Path; 2] {
        [&self.detection.cascade_path, &self.recognition.model_path]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RollcallConfig::default();
        assert_eq!(config.camera.device_index, 0);
        assert_eq!(config.detection.min_neighbors, 4);
        assert_eq!(config.recognition.threshold, 500.0);
        assert_eq!(config.recognition.face_size, 220);
        assert_eq!(config.ui.quit_key, 'q');
        assert_eq!(config.recognition.model_path, PathBuf::from("Classifiers/TrainedLBPH.yml"));
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let json = r#"{ "camera": { "device_index": 2 }, "ui": { "quit_key": "x" } }"#;
        let config: RollcallConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.camera.device_index, 2);
        assert_eq!(config.camera.frame_width, 640);
        assert_eq!(config.ui.quit_key, 'x');
        assert_eq!(config.ui.channel_capacity, 2);
        assert_eq!(config.detection.scale_factor, 1.1);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = RollcallConfig::load(Path::new("/nonexistent/rollcall/config.json")).unwrap();
        assert_eq!(config.detection.cascade_path, PathBuf::from("Classifiers/haarface.xml"));
    }

    #[test]
    fn test_invalid_file_is_error() {
        let path = std::env::temp_dir().join(format!("rollcall-config-{}.json", std::process::id()));
        fs::write(&path, "{ not json").unwrap();
        let result = RollcallConfig::load(&path);
        let _ = fs::remove_file(&path);
        assert!(result.is_err());
    }
}
