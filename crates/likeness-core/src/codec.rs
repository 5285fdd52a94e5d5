//! Persisted template layout: D consecutive little-endian f64 values, no header.

use crate::error::CodecError;
use crate::types::Template;

const VALUE_SIZE: usize = std::mem::size_of::<f64>();

pub fn encode_template(template: &Template) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.dim() * VALUE_SIZE);
    for v in template.values() {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

pub fn decode_template(bytes: &[u8]) -> Result<Template, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    if bytes.len() % VALUE_SIZE != 0 {
        return Err(CodecError::Misaligned(bytes.len()));
    }

    let values = bytes
        .chunks_exact(VALUE_SIZE)
        .map(|chunk| {
            let mut raw = [0u8; VALUE_SIZE];
            raw.copy_from_slice(chunk);
            f64::from_le_bytes(raw)
        })
        .collect();
    Ok(Template::new(values))
}
