//! Frame-to-sample pipeline: camera capture, detection, embedding.

use crate::overlay::SnapshotWriter;
use crate::policy::SessionConfig;
use facegate_core::{DetectionSample, FaceDetector, FaceEmbedder};
use facegate_hw::Camera;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("camera error: {0}")]
    Camera(#[from] facegate_hw::CameraError),
    #[error("detector error: {0}")]
    Detector(#[from] facegate_core::detector::DetectorError),
    #[error("embedder error: {0}")]
    Embedder(#[from] facegate_core::embedder::EmbedderError),
}

/// One scan attempt: a detection sample, or `None` when the frame held
/// no usable face.
pub type ScanOutcome = Result<Option<DetectionSample>, ScanError>;

/// Produces at most one detection sample per camera frame.
///
/// The scan procedures are generic over this trait so tests can script
/// attempt sequences without hardware.
pub trait FaceScanner {
    fn scan(&mut self) -> ScanOutcome;
}

/// The real pipeline: camera frame -> best detection -> embedding.
pub struct CameraScanner {
    camera: Camera,
    detector: FaceDetector,
    embedder: FaceEmbedder,
    snapshots: Option<SnapshotWriter>,
}

impl CameraScanner {
    /// Load both models, then open the camera and discard warmup
    /// frames. Fails fast if any resource is unavailable.
    pub fn open(config: &SessionConfig) -> Result<Self, ScanError> {
        let detector = FaceDetector::load(&config.detector_model_path())?;
        let embedder = FaceEmbedder::load(&config.embedder_model_path())?;

        let camera = Camera::open(&config.camera_device)?;
        tracing::info!(
            device = %camera.device_path,
            width = camera.width,
            height = camera.height,
            "capture ready"
        );

        if config.warmup_frames > 0 {
            tracing::debug!(count = config.warmup_frames, "discarding warmup frames");
            for _ in 0..config.warmup_frames {
                let _ = camera.grab();
            }
        }

        let snapshots = config.snapshot_dir.clone().map(SnapshotWriter::new);

        Ok(Self {
            camera,
            detector,
            embedder,
            snapshots,
        })
    }
}

impl FaceScanner for CameraScanner {
    fn scan(&mut self) -> ScanOutcome {
        let frame = self.camera.grab()?;
        if frame.is_dark {
            tracing::debug!(seq = frame.sequence, "dark frame, skipping");
            return Ok(None);
        }

        let Some(face) = self
            .detector
            .detect_best(&frame.data, frame.width, frame.height)?
        else {
            return Ok(None);
        };

        let embedding = self
            .embedder
            .extract(&frame.data, frame.width, frame.height, &face)?;

        // Snapshot failures are presentation-only; log and move on.
        if let Some(writer) = &mut self.snapshots {
            if let Err(e) = writer.write(&frame, &face) {
                tracing::warn!(error = %e, "failed to write debug snapshot");
            }
        }

        Ok(Some(DetectionSample { face, embedding }))
    }
}
