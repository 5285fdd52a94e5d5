//! likeness-models — Embedding extraction via ONNX Runtime.
//!
//! Wraps a face-embedding network (ArcFace-style, 112x112 input) behind
//! the core [`likeness_core::Extractor`] contract.

pub mod embedder;

pub use embedder::{FaceEmbedder, ModelError};
