//! Cosine similarity between two embeddings.

use crate::error::CoreError;

/// Score assigned when either vector has zero magnitude.
pub const ZERO_MAGNITUDE_SCORE: f64 = -1.0;

/// Cosine similarity `dot(a, b) / (|a| * |b|)`.
///
/// Returns a value in [-1, 1], not clamped. A zero-magnitude input scores
/// [`ZERO_MAGNITUDE_SCORE`] so it can never be accepted as a match.
pub fn score(a: &[f64], b: &[f64]) -> Result<f64, CoreError> {
    if a.len() != b.len() {
        return Err(CoreError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        return Ok(ZERO_MAGNITUDE_SCORE);
    }
    Ok(dot / denom)
}
