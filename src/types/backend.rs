//! Names of the compression backends and of the payload serialization paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoffeeError;

/// The closed set of compression backends the estimator knows about.
///
/// Knowing a name is not the same as having it: `Zstd` is only usable when the
/// crate is built with the `zstd` feature. See `kernels::BackendRegistry`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// General-purpose and fast (DEFLATE with gzip framing).
    #[default]
    Gzip,
    /// Higher ratio, slower (Burrows-Wheeler).
    Bzip,
    /// Modern and tunable; optional at build time.
    Zstd,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Gzip, Backend::Bzip, Backend::Zstd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gzip => "gzip",
            Backend::Bzip => "bzip",
            Backend::Zstd => "zstd",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Backend::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| {
                CoffeeError::Configuration(format!(
                    "unknown compression backend '{}' (expected one of: gzip, bzip, zstd)",
                    s
                ))
            })
    }
}

/// Which serialization path turns an array into compressor input.
///
/// Sizes computed under different encodings are not comparable, so a run uses
/// exactly one encoding for every resolution and every sample.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PayloadEncoding {
    /// Fixed-width native-endian element bytes, no delimiters.
    #[default]
    Binary,
    /// ASCII decimal elements joined by single spaces.
    Text,
}

impl fmt::Display for PayloadEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadEncoding::Binary => f.write_str("binary"),
            PayloadEncoding::Text => f.write_str("text"),
        }
    }
}

impl FromStr for PayloadEncoding {
    type Err = CoffeeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "binary" => Ok(PayloadEncoding::Binary),
            "text" => Ok(PayloadEncoding::Text),
            other => Err(CoffeeError::Configuration(format!(
                "unknown payload encoding '{}' (expected binary or text)",
                other
            ))),
        }
    }
}
