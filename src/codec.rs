//! Sample codec
//!
//! Converts the engine's `f32` samples to the 32-bit fixed-point format
//! written to the output transport.
//!
//! There is no explicit clamping. Input outside [-1.0, 1.0] saturates at
//! the `i32` bounds (Rust float→int casts saturate, NaN becomes 0); that
//! is an upstream bug surfacing, not something corrected here.

use std::io::{self, Write};

/// Full-scale value: 2^31 - 1
pub const FULL_SCALE: f64 = i32::MAX as f64;

/// Encode a single sample
#[inline]
pub fn encode_sample(sample: f32) -> i32 {
    (sample as f64 * FULL_SCALE).round() as i32
}

/// Encode a block into a preallocated buffer
///
/// Only `min(block.len(), out.len())` samples are converted.
pub fn encode(block: &[f32], out: &mut [i32]) {
    for (dst, &src) in out.iter_mut().zip(block) {
        *dst = encode_sample(src);
    }
}

/// Encode a block into a new vector
pub fn encode_vec(block: &[f32]) -> Vec<i32> {
    block.iter().map(|&s| encode_sample(s)).collect()
}

/// Write an encoded block as raw native-endian samples, no framing
pub fn write_block<W: Write>(writer: &mut W, block: &[i32]) -> io::Result<()> {
    writer.write_all(bytemuck::cast_slice(block))
}
