//! facegate-core — Face detection and embedding extraction engine.
//!
//! Uses SCRFD for face detection and ArcFace for embedding extraction,
//! both running via ONNX Runtime for CPU inference. Model assets are
//! loaded from a fixed directory at session start; there is no version
//! negotiation or integrity check.

pub mod detector;
pub mod embedder;
mod raster;
pub mod types;

pub use detector::FaceDetector;
pub use embedder::FaceEmbedder;
pub use types::{BoundingBox, DetectionSample, Embedding, FaceMatch, ReferenceFace};

use std::path::PathBuf;

/// File name of the SCRFD detection model.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// File name of the ArcFace embedding model.
pub const EMBEDDER_MODEL_FILE: &str = "w600k_r50.onnx";

/// Default directory holding the ONNX model assets.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facegate/models")
}
