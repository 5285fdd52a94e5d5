use thiserror::Error;

/// Failures reported by an embedding extractor.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("no face detected")]
    NoFaceDetected,
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("image too large: {size} bytes exceeds limit of {limit} bytes")]
    ImageTooLarge { size: usize, limit: usize },
    #[error("extractor backend failed: {0}")]
    Backend(String),
}

/// I/O failure at the template store boundary, propagated unchanged.
#[derive(Error, Debug)]
#[error("storage error: {0}")]
pub struct StorageError(#[source] Box<dyn std::error::Error + Send + Sync>);

impl StorageError {
    pub fn new(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self(source.into())
    }
}

/// Malformed persisted template blob.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CodecError {
    #[error("empty template blob")]
    Empty,
    #[error("template blob length {0} is not a multiple of 8")]
    Misaligned(usize),
}

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("no usable samples collected during enrollment")]
    InsufficientSamples,
    #[error("similarity threshold {0} outside [-1, 1]")]
    InvalidThreshold(f64),
    #[error("invalid capture policy: {0}")]
    InvalidPolicy(&'static str),
    #[error("enrollment cancelled")]
    Cancelled,
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
}
