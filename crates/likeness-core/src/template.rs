//! Template building: element-wise mean of enrollment embeddings.

use crate::error::CoreError;
use crate::types::{Embedding, Template};

/// Average a batch of embeddings into one template.
///
/// Every sample contributes equally; there is no outlier rejection and
/// the result is not re-normalized.
pub fn build(embeddings: &[Embedding]) -> Result<Template, CoreError> {
    let first = embeddings.first().ok_or(CoreError::InsufficientSamples)?;
    let dim = first.dim();

    let mut sums = vec![0.0f64; dim];
    for embedding in embeddings {
        if embedding.dim() != dim {
            return Err(CoreError::DimensionMismatch {
                expected: dim,
                actual: embedding.dim(),
            });
        }
        for (sum, v) in sums.iter_mut().zip(embedding.values()) {
            *sum += v;
        }
    }

    let n = embeddings.len() as f64;
    Ok(Template::new(sums.into_iter().map(|s| s / n).collect()))
}
