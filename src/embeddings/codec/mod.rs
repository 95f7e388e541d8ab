
use crate::{Result, StoreError};

// Embeddings persist as a JSON array of floats at 8 decimal places. Not a
// byte-exact round trip, but comparison-stable: decode(encode(v)) stays
// within distance tolerance of v.

/// Encode a vector into its persisted text form. Deterministic: equal
/// vectors always produce equal strings.
#[inline]
pub fn encode(vector: &[f32]) -> String {
    let mut out = String::with_capacity(vector.len() * 12 + 2);
    out.push('[');
    for (i, value) in vector.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&format!("{value:.8}"));
    }
    out.push(']');
    out
}

/// Decode a persisted embedding. Anything that does not parse as a JSON
/// array of numbers is malformed.
#[inline]
pub fn decode(raw: &str) -> Result<Vec<f32>> {
    serde_json::from_str(raw).map_err(|e| StoreError::MalformedEmbedding(e.to_string()))
}

/// Check a vector against the store's configured dimension. Called before
/// every write and every query.
#[inline]
pub fn validate_dimension(vector: &[f32], expected: usize) -> Result<()> {
    if vector.len() == expected {
        Ok(())
    } else {
        Err(StoreError::DimensionMismatch {
            expected,
            actual: vector.len(),
        })
    }
}
