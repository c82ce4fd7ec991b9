//! This module contains the pure, stateless kernel for measuring the Zstandard
//! compressed size of a byte buffer.
//!
//! Zstandard is the optional backend: the whole module only exists when the
//! crate is built with the `zstd` feature. The level is fixed so that sizes are
//! reproducible across runs and machines.
//! This module is a safe, panic-free wrapper around the `zstd` crate.

use std::io::Write;
use zstd::stream::Encoder;

use super::CompressionBackend;
use crate::error::CoffeeError;
use crate::types::Backend;

/// The fixed compression level used for complexity estimates.
pub const ZSTD_LEVEL: i32 = 3;

//==================================================================================
// 1. Core Logic (The "Engine")
//==================================================================================

/// Compresses a byte slice using the Zstandard algorithm, writing to an output buffer.
fn compress_slice(
    input_bytes: &[u8],
    output_buf: &mut Vec<u8>,
    level: i32,
) -> Result<(), CoffeeError> {
    // We use the streaming Encoder, which writes directly to the output buffer.
    let mut encoder = Encoder::new(output_buf, level).map_err(zstd_error)?;
    encoder.write_all(input_bytes).map_err(zstd_error)?;

    // `finish` is essential to finalize the Zstd frame.
    encoder.finish().map_err(zstd_error)?;
    Ok(())
}

fn zstd_error(e: std::io::Error) -> CoffeeError {
    CoffeeError::Compression {
        backend: Backend::Zstd,
        reason: e.to_string(),
    }
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Returns the size in bytes of the complete Zstandard frame for `input_bytes`.
pub fn compressed_len(input_bytes: &[u8], level: i32) -> Result<usize, CoffeeError> {
    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + 16);
    compress_slice(input_bytes, &mut output_buf, level)?;
    Ok(output_buf.len())
}

/// The `zstd` backend at the fixed level `ZSTD_LEVEL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZstdBackend;

impl CompressionBackend for ZstdBackend {
    fn kind(&self) -> Backend {
        Backend::Zstd
    }

    fn compress_len(&self, bytes: &[u8]) -> Result<usize, CoffeeError> {
        compressed_len(bytes, ZSTD_LEVEL)
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
