//! The complexity estimator: serialize a payload, hand it to a backend, report
//! the compressed length.
//!
//! There are two serialization paths and they are not interchangeable. A
//! binary payload is the raw fixed-width element bytes of an array; a text
//! payload is its ASCII rendering. The same lattice produces very different
//! sizes under the two, so sizes are only ever compared within one encoding.

use bytemuck::Pod;
use ndarray::{ArrayView, Dimension};
use std::fmt::{Display, Write as _};

use crate::error::CoffeeError;
use crate::kernels::BackendRegistry;
use crate::types::{Backend, PayloadEncoding};

/// Serialized input for one compression job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Binary(Vec<u8>),
    Text(String),
}

impl Payload {
    /// Fixed-width native-endian bytes of `array`, in logical (row-major)
    /// order, with no delimiters.
    pub fn binary<A, D>(array: &ArrayView<'_, A, D>) -> Result<Self, CoffeeError>
    where
        A: Pod,
        D: Dimension,
    {
        let standard = array.as_standard_layout();
        let elements = standard.as_slice().ok_or_else(|| {
            CoffeeError::InternalError("standard-layout array is not contiguous".to_string())
        })?;
        let bytes: &[u8] = bytemuck::try_cast_slice(elements)?;
        Ok(Payload::Binary(bytes.to_vec()))
    }

    /// Every element in decimal, in logical order, joined by single spaces.
    ///
    /// Rows are joined with the same separator, so a 2×2 lattice `[[0, 1], [1, 0]]`
    /// renders as `"0 1 1 0"`.
    pub fn text<A, D>(array: &ArrayView<'_, A, D>) -> Self
    where
        A: Display,
        D: Dimension,
    {
        let mut out = String::with_capacity(array.len() * 2);
        for (i, value) in array.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            // Writing into a String cannot fail.
            let _ = write!(out, "{}", value);
        }
        Payload::Text(out)
    }

    /// Wraps an arbitrary string for the text path. Only ASCII is accepted.
    pub fn ascii(text: impl Into<String>) -> Result<Self, CoffeeError> {
        let text = text.into();
        if !text.is_ascii() {
            return Err(CoffeeError::Configuration(
                "text payloads must be ASCII".to_string(),
            ));
        }
        Ok(Payload::Text(text))
    }

    /// Serializes `array` along the path selected by `encoding`.
    pub fn encode<A, D>(
        array: &ArrayView<'_, A, D>,
        encoding: PayloadEncoding,
    ) -> Result<Self, CoffeeError>
    where
        A: Pod + Display,
        D: Dimension,
    {
        match encoding {
            PayloadEncoding::Binary => Self::binary(array),
            PayloadEncoding::Text => Ok(Self::text(array)),
        }
    }

    pub fn encoding(&self) -> PayloadEncoding {
        match self {
            Payload::Binary(_) => PayloadEncoding::Binary,
            Payload::Text(_) => PayloadEncoding::Text,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Payload::Binary(bytes) => bytes,
            Payload::Text(text) => text.as_bytes(),
        }
    }
}

/// Compressed length of `payload` under `backend`.
///
/// # Errors
/// `BackendUnavailable` if `backend` is not in `registry`; `Compression` if the
/// encoder itself fails.
pub fn estimate(
    payload: &Payload,
    backend: Backend,
    registry: &BackendRegistry,
) -> Result<usize, CoffeeError> {
    registry.resolve(backend)?.compress_len(payload.as_bytes())
}
