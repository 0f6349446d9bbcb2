//! Scan policy and session configuration, loaded from `FACEGATE_*`
//! environment variables with defaults.

use std::path::PathBuf;
use std::time::Duration;

/// Bounds and thresholds for one scan procedure (enroll or verify).
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Attempt budget per procedure; no retry beyond it.
    pub max_attempts: usize,
    /// Sampling cadence between attempts.
    pub interval: Duration,
    /// Minimum detector confidence for an enrollment candidate.
    pub confidence_threshold: f32,
    /// Distances strictly below this count as a verification match.
    pub distance_threshold: f32,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(1000),
            confidence_threshold: 0.3,
            distance_threshold: 0.3,
        }
    }
}

/// Full session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Frames discarded at startup for camera AGC/AE stabilization.
    pub warmup_frames: usize,
    /// Where annotated debug snapshots go; disabled when unset.
    pub snapshot_dir: Option<PathBuf>,
    pub policy: ScanPolicy,
}

impl SessionConfig {
    /// Load configuration from `FACEGATE_*` environment variables.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("FACEGATE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| facegate_core::default_model_dir());

        Self {
            camera_device: std::env::var("FACEGATE_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            warmup_frames: env_usize("FACEGATE_WARMUP_FRAMES", 4),
            snapshot_dir: std::env::var("FACEGATE_SNAPSHOT_DIR").ok().map(PathBuf::from),
            policy: ScanPolicy {
                max_attempts: env_usize("FACEGATE_MAX_ATTEMPTS", 10),
                interval: Duration::from_millis(env_u64("FACEGATE_SCAN_INTERVAL_MS", 1000)),
                confidence_threshold: env_f32("FACEGATE_CONFIDENCE_THRESHOLD", 0.3),
                distance_threshold: env_f32("FACEGATE_DISTANCE_THRESHOLD", 0.3),
            },
        }
    }

    /// Path to the SCRFD detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join(facegate_core::DETECTOR_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace embedding model.
    pub fn embedder_model_path(&self) -> String {
        self.model_dir
            .join(facegate_core::EMBEDDER_MODEL_FILE)
            .to_string_lossy()
            .into_owned()
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
