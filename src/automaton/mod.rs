//! Automaton variants: the physics the trajectory engine is generic over.
//!
//! A variant is anything implementing `Automaton`: it seeds a lattice, advances
//! it by one transition, says when it is mixed, and names the block reduction
//! that coarse-graining should use for its cells. The engine never looks inside
//! a variant; it only calls these methods from its control thread.
//!
//! Variants are selected by name through a `VariantRegistry`, an immutable
//! table built once at startup and handed to whoever constructs engines.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::Rng;
use std::fmt;

use crate::coarse_grain::BlockReduction;
use crate::config::SimulationConfig;
use crate::error::CoffeeError;
use crate::types::InitialState;

pub mod interacting;
pub mod non_interacting;

pub use interacting::InteractingAutomaton;
pub use non_interacting::NonInteractingAutomaton;

/// The fine-resolution state: an `n × n` lattice of cream counts.
pub type Grid = Array2<u32>;

//==================================================================================
// 1. The Variant Contract
//==================================================================================

pub trait Automaton: Send + fmt::Debug {
    /// Registry name of the variant.
    fn name(&self) -> &'static str;

    /// The lattice at step 0.
    fn seed(&self, n: usize, initial: InitialState) -> Grid {
        seed_pattern(n, initial)
    }

    /// Applies exactly one transition in place.
    fn step(&self, grid: &mut Grid, rng: &mut StdRng);

    /// Whether the lattice has reached the variant's terminal (mixed) condition.
    fn is_terminal(&self, grid: &Grid) -> bool;

    /// Transitions between two evaluations of `is_terminal` in a run that
    /// waits for convergence. Convergence is detected at multiples of it.
    fn terminal_check_interval(&self, _n: usize) -> u64 {
        1
    }

    /// How a block of cells collapses into one coarse cell.
    fn reduction(&self) -> BlockReduction;
}

//==================================================================================
// 2. Shared Physics Helpers
//==================================================================================

/// Von Neumann neighbourhood offsets: up, down, left, right.
const NEIGHBOURS: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// Builds the step-0 lattice for `initial`.
///
/// `Updown` puts cream in the top `n / 2` rows. `Circular` puts cream in the
/// disc of radius `n / 4` centred on the lattice.
pub fn seed_pattern(n: usize, initial: InitialState) -> Grid {
    match initial {
        InitialState::Updown => Grid::from_shape_fn((n, n), |(i, _)| u32::from(i < n / 2)),
        InitialState::Circular => {
            let centre = (n as f64 - 1.0) / 2.0;
            let radius = n as f64 / 4.0;
            Grid::from_shape_fn((n, n), |(i, j)| {
                let di = i as f64 - centre;
                let dj = j as f64 - centre;
                u32::from(di * di + dj * dj <= radius * radius)
            })
        }
    }
}

/// Picks a uniformly random von Neumann neighbour of `(i, j)`.
///
/// Returns `None` when the chosen neighbour lies outside the lattice; the cup
/// has walls, not periodic boundaries.
pub(crate) fn random_neighbour(
    (i, j): (usize, usize),
    (rows, cols): (usize, usize),
    rng: &mut StdRng,
) -> Option<(usize, usize)> {
    let (di, dj) = NEIGHBOURS[rng.random_range(0..NEIGHBOURS.len())];
    let ni = i.checked_add_signed(di).filter(|&r| r < rows)?;
    let nj = j.checked_add_signed(dj).filter(|&c| c < cols)?;
    Some((ni, nj))
}

/// The mixing predicate shared by the built-in variants.
///
/// The lattice is mixed when the mean density of every row and of every column
/// lies within `tolerance` (absolute, in particles per cell) of the global mean
/// density.
pub fn is_mixed(grid: &Grid, tolerance: f64) -> bool {
    let (rows, cols) = grid.dim();
    if rows == 0 || cols == 0 {
        return true;
    }
    let total: f64 = grid.iter().map(|&v| f64::from(v)).sum();
    let global = total / (rows * cols) as f64;
    let within = |line: ndarray::ArrayView1<'_, u32>| {
        let mean = line.iter().map(|&v| f64::from(v)).sum::<f64>() / line.len() as f64;
        (mean - global).abs() <= tolerance
    };
    grid.rows().into_iter().all(within) && grid.columns().into_iter().all(within)
}

//==================================================================================
// 3. Variant Registry
//==================================================================================

/// Builds a variant from the run configuration.
pub type VariantFactory = fn(&SimulationConfig) -> Box<dyn Automaton>;

#[derive(Clone)]
pub enum VariantEntry {
    Available(VariantFactory),
    /// Known by name, but its implementation is missing from this runtime.
    Unavailable { reason: String },
}

/// An immutable name → factory table.
#[derive(Clone)]
pub struct VariantRegistry {
    entries: Vec<(String, VariantEntry)>,
}

impl VariantRegistry {
    /// The variants compiled into this crate: `int` and `nonint`.
    pub fn builtin() -> Self {
        Self { entries: Vec::new() }
            .with_variant("int", InteractingAutomaton::boxed)
            .with_variant("nonint", NonInteractingAutomaton::boxed)
    }

    /// Adds (or replaces) an available variant.
    pub fn with_variant(mut self, name: &str, factory: VariantFactory) -> Self {
        self.insert(name, VariantEntry::Available(factory));
        self
    }

    /// Registers a name whose implementation is absent, so selecting it reports
    /// `VariantUnavailable` rather than "unknown variant".
    pub fn with_unavailable(mut self, name: &str, reason: &str) -> Self {
        self.insert(
            name,
            VariantEntry::Unavailable {
                reason: reason.to_string(),
            },
        );
        self
    }

    fn insert(&mut self, name: &str, entry: VariantEntry) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((name.to_string(), entry)),
        }
    }

    /// Names of the variants that can be constructed.
    pub fn names(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| matches!(e, VariantEntry::Available(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Constructs the variant registered under `name`.
    ///
    /// # Errors
    /// `Configuration` for an unknown name, `VariantUnavailable` for a known but
    /// absent one.
    pub fn create(
        &self,
        name: &str,
        config: &SimulationConfig,
    ) -> Result<Box<dyn Automaton>, CoffeeError> {
        match self.entries.iter().find(|(n, _)| n == name) {
            Some((_, VariantEntry::Available(factory))) => Ok(factory(config)),
            Some((_, VariantEntry::Unavailable { reason })) => {
                Err(CoffeeError::VariantUnavailable {
                    name: name.to_string(),
                    reason: reason.clone(),
                })
            }
            None => Err(CoffeeError::Configuration(format!(
                "unknown automaton variant '{}' (expected one of: {})",
                name,
                self.names().join(", ")
            ))),
        }
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for VariantRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantRegistry")
            .field("available", &self.names())
            .finish()
    }
}
