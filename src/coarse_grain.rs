//! The coarse-graining transform: resolution bookkeeping only.
//!
//! `coarse_grain` tiles an array of any dimensionality with `k × … × k` blocks
//! and collapses each block to one value. Along every axis the output length is
//! `floor(len / k)`; cells in a trailing partial block are dropped. What "collapse"
//! means is physics, so the reduction is supplied by the automaton variant.

use ndarray::{Array, ArrayView, Dimension, Zip};
use num_traits::{NumCast, PrimInt, Unsigned};
use serde::{Deserialize, Serialize};

use crate::error::CoffeeError;

/// Reduces every complete `block`-sized tile of `array` with `reduce`.
///
/// # Errors
/// Returns `CoffeeError::Configuration` if `block` is zero.
pub fn coarse_grain<A, D, F>(
    array: &ArrayView<'_, A, D>,
    block: usize,
    reduce: F,
) -> Result<Array<A, D>, CoffeeError>
where
    A: Copy,
    D: Dimension,
    F: Fn(ArrayView<'_, A, D>) -> A,
{
    if block == 0 {
        return Err(CoffeeError::Configuration(
            "coarse-graining block size must be positive".to_string(),
        ));
    }
    let mut tile = array.raw_dim();
    for len in tile.slice_mut() {
        *len = block;
    }
    // `exact_chunks` yields only complete tiles, which is the boundary policy.
    Ok(Zip::from(array.exact_chunks(tile)).map_collect(|cell| reduce(cell)))
}

/// The per-block reductions used by the built-in variants.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReduction {
    /// Total of the block. Conserves particle counts across resolutions.
    Sum,
    /// Fraction of occupied cells quantized into `levels` equal-width buckets,
    /// `0..levels`. With three levels a block reads as mostly coffee, mixed, or
    /// mostly cream.
    Bucketed { levels: u32 },
}

impl BlockReduction {
    pub fn apply<A, D>(&self, block: ArrayView<'_, A, D>) -> A
    where
        A: PrimInt + Unsigned,
        D: Dimension,
    {
        match *self {
            BlockReduction::Sum => block
                .iter()
                .fold(A::zero(), |acc, &v| acc.saturating_add(v)),
            BlockReduction::Bucketed { levels } => {
                let cells = block.len();
                if cells == 0 || levels == 0 {
                    return A::zero();
                }
                let levels = levels as usize;
                let occupied = block.iter().filter(|v| !v.is_zero()).count();
                let bucket = (occupied * levels / cells).min(levels - 1);
                <A as NumCast>::from(bucket).unwrap_or_else(A::max_value)
            }
        }
    }
}

/// `coarse_grain` with one of the built-in reductions.
pub fn coarse_grain_with<A, D>(
    array: &ArrayView<'_, A, D>,
    block: usize,
    reduction: BlockReduction,
) -> Result<Array<A, D>, CoffeeError>
where
    A: PrimInt + Unsigned,
    D: Dimension,
{
    coarse_grain(array, block, |tile| reduction.apply(tile))
}
