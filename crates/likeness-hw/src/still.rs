//! Still-image decoding for single-shot recognition.

use crate::frame::Frame;
use likeness_core::ExtractError;
use std::path::Path;

/// Decode an encoded image (PNG, JPEG, BMP, ...) into a grayscale frame.
///
/// Inputs larger than `max_bytes` are rejected before decoding.
pub fn decode_image(bytes: &[u8], max_bytes: usize) -> Result<Frame, ExtractError> {
    if bytes.len() > max_bytes {
        return Err(ExtractError::ImageTooLarge {
            size: bytes.len(),
            limit: max_bytes,
        });
    }

    let decoded =
        image::load_from_memory(bytes).map_err(|e| ExtractError::InvalidImage(e.to_string()))?;
    let gray = decoded.to_luma8();
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 {
        return Err(ExtractError::InvalidImage("image has no pixels".into()));
    }

    Ok(Frame::new(gray.into_raw(), width, height))
}

/// Read and decode an image file, checking its size before loading it.
pub fn read_image(path: &Path, max_bytes: usize) -> Result<Frame, ExtractError> {
    let unreadable = |e: std::io::Error| ExtractError::InvalidImage(format!("{}: {e}", path.display()));

    let size = std::fs::metadata(path).map_err(unreadable)?.len();
    let size = usize::try_from(size).unwrap_or(usize::MAX);
    if size > max_bytes {
        return Err(ExtractError::ImageTooLarge {
            size,
            limit: max_bytes,
        });
    }

    let bytes = std::fs::read(path).map_err(unreadable)?;
    let frame = decode_image(&bytes, max_bytes)?;
    tracing::debug!(
        path = %path.display(),
        width = frame.width,
        height = frame.height,
        "decoded still image"
    );
    Ok(frame)
}
