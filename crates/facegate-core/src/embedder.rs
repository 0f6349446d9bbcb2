//! ArcFace face embedder via ONNX Runtime.
//!
//! Extracts 512-dimensional embeddings from a margin-padded crop of
//! the detected bounding box, resized to the 112x112 model input.
//! Landmarks are not used; the box crop is the whole geometry story.

use crate::raster;
use crate::types::{BoundingBox, Embedding};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const EMBED_INPUT_SIZE: usize = 112;
const EMBED_MEAN: f32 = 127.5;
const EMBED_STD: f32 = 127.5; // symmetric normalization, unlike SCRFD
const EMBED_DIM: usize = 512;
const EMBED_MODEL_VERSION: &str = "w600k_r50";

/// Fraction of the box size padded around it before cropping, so the
/// crop keeps some forehead/chin context.
const CROP_MARGIN: f32 = 0.2;

#[derive(Error, Debug)]
pub enum EmbedderError {
    #[error("model file not found: {0} — download from insightface and place in the model dir")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("degenerate face box: {width}x{height}")]
    DegenerateBox { width: f32, height: f32 },
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ArcFace-based embedding extractor.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EmbedderError> {
        if !Path::new(model_path).exists() {
            return Err(EmbedderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    /// Extract an L2-normalized embedding for a detected face.
    pub fn extract(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &BoundingBox,
    ) -> Result<Embedding, EmbedderError> {
        if face.width <= 1.0 || face.height <= 1.0 {
            return Err(EmbedderError::DegenerateBox {
                width: face.width,
                height: face.height,
            });
        }

        let crop = crop_face(frame, width as usize, height as usize, face);
        let input = Self::preprocess(&crop);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EmbedderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != EMBED_DIM {
            return Err(EmbedderError::InferenceFailed(format!(
                "expected {EMBED_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
        let values = if norm > 0.0 {
            raw.iter().map(|x| x / norm).collect()
        } else {
            raw.to_vec()
        };

        Ok(Embedding {
            values,
            model_version: Some(EMBED_MODEL_VERSION.to_string()),
        })
    }

    /// Normalize a 112x112 grayscale crop into a NCHW float tensor.
    fn preprocess(crop: &[u8]) -> Array4<f32> {
        let size = EMBED_INPUT_SIZE;
        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

        for y in 0..size {
            for x in 0..size {
                let pixel = crop.get(y * size + x).copied().unwrap_or(0) as f32;
                let normalized = (pixel - EMBED_MEAN) / EMBED_STD;
                tensor[[0, 0, y, x]] = normalized;
                tensor[[0, 1, y, x]] = normalized;
                tensor[[0, 2, y, x]] = normalized;
            }
        }

        tensor
    }
}

/// Pad the detected box by `CROP_MARGIN` on every side and resample
/// the region to the model input size.
fn crop_face(frame: &[u8], width: usize, height: usize, face: &BoundingBox) -> Vec<u8> {
    let margin_x = face.width * CROP_MARGIN;
    let margin_y = face.height * CROP_MARGIN;

    raster::resize_region(
        frame,
        width,
        height,
        face.x - margin_x,
        face.y - margin_y,
        face.x + face.width + margin_x,
        face.y + face.height + margin_y,
        EMBED_INPUT_SIZE,
    )
}
