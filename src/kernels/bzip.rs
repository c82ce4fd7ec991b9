//! The higher-ratio, slower backend: bzip2 via the `bzip2` crate.

use bzip2::write::BzEncoder;
use bzip2::Compression;
use std::io::Write;

use super::CompressionBackend;
use crate::error::CoffeeError;
use crate::types::Backend;

/// 900k blocks, the highest ratio bzip2 offers.
pub const BZIP_LEVEL: u32 = 9;

#[derive(Debug, Clone, Copy)]
pub struct BzipBackend {
    level: Compression,
}

impl Default for BzipBackend {
    fn default() -> Self {
        Self {
            level: Compression::new(BZIP_LEVEL),
        }
    }
}

impl CompressionBackend for BzipBackend {
    fn kind(&self) -> Backend {
        Backend::Bzip
    }

    fn compress_len(&self, bytes: &[u8]) -> Result<usize, CoffeeError> {
        let mut encoder = BzEncoder::new(Vec::with_capacity(bytes.len() / 2 + 64), self.level);
        encoder.write_all(bytes).map_err(bzip_error)?;
        let compressed = encoder.finish().map_err(bzip_error)?;
        Ok(compressed.len())
    }
}

fn bzip_error(e: std::io::Error) -> CoffeeError {
    CoffeeError::Compression {
        backend: Backend::Bzip,
        reason: e.to_string(),
    }
}
