use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bounding box for a detected face, with optional facial landmarks.
///
/// Landmarks are carried for display purposes only (debug overlay);
/// nothing downstream depends on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace), L2-normalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Compute Euclidean distance to another embedding. Smaller = more similar.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// Transient result of analyzing one camera frame: geometry plus embedding.
#[derive(Debug, Clone)]
pub struct DetectionSample {
    pub face: BoundingBox,
    pub embedding: Embedding,
}

impl DetectionSample {
    /// Detector-reported confidence that this sample contains a face.
    pub fn confidence(&self) -> f32 {
        self.face.confidence
    }
}

/// The single enrolled reference face for the current session.
///
/// At most one exists at a time; re-enrollment replaces it. Never
/// persisted — it dies with the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceFace {
    pub label: String,
    pub embedding: Embedding,
    pub enrolled_at: DateTime<Utc>,
}

impl ReferenceFace {
    pub fn new(label: impl Into<String>, embedding: Embedding) -> Self {
        Self {
            label: label.into(),
            embedding,
            enrolled_at: Utc::now(),
        }
    }

    /// Compare a probe embedding against this reference.
    pub fn match_against(&self, probe: &Embedding) -> FaceMatch {
        FaceMatch {
            label: self.label.clone(),
            distance: self.embedding.euclidean_distance(probe),
        }
    }
}

/// Result of comparing a probe embedding against the reference.
#[derive(Debug, Clone)]
pub struct FaceMatch {
    pub label: String,
    /// Euclidean distance to the reference embedding.
    pub distance: f32,
}

impl FaceMatch {
    /// True if the distance falls strictly under the acceptance threshold.
    pub fn is_within(&self, threshold: f32) -> bool {
        self.distance < threshold
    }
}
