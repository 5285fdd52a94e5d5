//! Face embedding network via ONNX Runtime.
//!
//! Frames are treated as face crops: the whole frame is resized to the
//! network input, normalized, and embedded. A crop with too little
//! contrast to contain a face is reported as [`ExtractError::NoFaceDetected`].

use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use likeness_core::{Embedding, ExtractError, Extractor};
use likeness_hw::Frame;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const INPUT_SIZE: u32 = 112;
const INPUT_MEAN: f32 = 127.5;
const INPUT_STD: f32 = 127.5;
const EMBEDDING_DIM: usize = 512;
/// Minimum pixel standard deviation of the resized crop.
const MIN_FACE_CONTRAST: f32 = 6.0;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX face embedder producing L2-normalized 512-d embeddings.
pub struct FaceEmbedder {
    session: Session,
}

impl FaceEmbedder {
    pub fn load(model_path: &Path) -> Result<Self, ModelError> {
        if !model_path.exists() {
            return Err(ModelError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            inputs = ?session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded embedding model"
        );

        Ok(Self { session })
    }

    pub fn dim(&self) -> usize {
        EMBEDDING_DIM
    }

    fn run(&mut self, input: &Array4<f32>) -> Result<Vec<f32>, ort::Error> {
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;
        let (_, raw) = outputs[0].try_extract_tensor::<f32>()?;
        Ok(raw.to_vec())
    }
}

impl Extractor<Frame> for FaceEmbedder {
    fn extract(&mut self, frame: &Frame) -> Result<Embedding, ExtractError> {
        let crop = resize_crop(frame)?;
        if pixel_stddev(&crop) < MIN_FACE_CONTRAST {
            return Err(ExtractError::NoFaceDetected);
        }

        let input = preprocess(&crop);
        let raw = self
            .run(&input)
            .map_err(|e| ExtractError::Backend(format!("embedding inference: {e}")))?;

        if raw.len() != EMBEDDING_DIM {
            return Err(ExtractError::Backend(format!(
                "expected {EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }

        Ok(Embedding::new(l2_normalize(&raw)))
    }
}

/// Resize a grayscale frame to the network's square input.
fn resize_crop(frame: &Frame) -> Result<Vec<u8>, ExtractError> {
    let view = ImageBuffer::<Luma<u8>, &[u8]>::from_raw(frame.width, frame.height, &frame.data[..])
        .ok_or_else(|| {
            ExtractError::InvalidImage(format!(
                "{} bytes cannot hold a {}x{} frame",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })?;
    Ok(imageops::resize(&view, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle).into_raw())
}

fn pixel_stddev(pixels: &[u8]) -> f32 {
    if pixels.is_empty() {
        return 0.0;
    }
    let n = pixels.len() as f32;
    let mean = pixels.iter().map(|&p| p as f32).sum::<f32>() / n;
    let variance = pixels.iter().map(|&p| (p as f32 - mean).powi(2)).sum::<f32>() / n;
    variance.sqrt()
}

/// Grayscale crop → NCHW float tensor, gray replicated into all three channels.
fn preprocess(crop: &[u8]) -> Array4<f32> {
    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for y in 0..size {
        for x in 0..size {
            let pixel = crop.get(y * size + x).copied().unwrap_or(0) as f32;
            let normalized = (pixel - INPUT_MEAN) / INPUT_STD;
            for c in 0..3 {
                tensor[[0, c, y, x]] = normalized;
            }
        }
    }

    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f64> {
    let norm = raw.iter().map(|&x| (x as f64).powi(2)).sum::<f64>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|&x| x as f64 / norm).collect()
    } else {
        raw.iter().map(|&x| x as f64).collect()
    }
}
