//! The general-purpose, fast backend: DEFLATE with gzip framing via `flate2`.
//!
//! The gzip header carries a modification time; `flate2` writes zero there, so
//! the compressed length depends only on the input bytes.

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;

use super::CompressionBackend;
use crate::error::CoffeeError;
use crate::types::Backend;

/// Maximum DEFLATE effort.
pub const GZIP_LEVEL: u32 = 9;

#[derive(Debug, Clone, Copy)]
pub struct GzipBackend {
    level: Compression,
}

impl Default for GzipBackend {
    fn default() -> Self {
        Self {
            level: Compression::new(GZIP_LEVEL),
        }
    }
}

impl CompressionBackend for GzipBackend {
    fn kind(&self) -> Backend {
        Backend::Gzip
    }

    fn compress_len(&self, bytes: &[u8]) -> Result<usize, CoffeeError> {
        let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 32), self.level);
        encoder.write_all(bytes).map_err(gzip_error)?;
        let compressed = encoder.finish().map_err(gzip_error)?;
        Ok(compressed.len())
    }
}

fn gzip_error(e: std::io::Error) -> CoffeeError {
    CoffeeError::Compression {
        backend: Backend::Gzip,
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gzip_len_of_empty_input_is_just_framing() {
        // 10-byte header + empty deflate block + 8-byte trailer.
        let len = GzipBackend::default().compress_len(&[]).unwrap();
        assert!(len >= 18);
        assert!(len < 32);
    }

    #[test]
    fn test_gzip_repetitive_input_compresses() {
        let data = b"0101010101010101".repeat(64);
        let len = GzipBackend::default().compress_len(&data).unwrap();
        assert!(len < data.len() / 4);
    }
}
