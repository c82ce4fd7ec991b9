//! The interacting variant: particles exclude each other.
//!
//! Each transition picks one cell uniformly at random and one of its von
//! Neumann neighbours, then swaps the two cells. Swapping two cream cells (or
//! two coffee cells) is a no-op, so cells only ever hold 0 or 1 and cream is
//! conserved exactly.

use rand::rngs::StdRng;
use rand::Rng;

use super::{is_mixed, random_neighbour, Automaton, Grid};
use crate::coarse_grain::BlockReduction;
use crate::config::SimulationConfig;

/// Three-level bucketing: mostly coffee, mixed, mostly cream.
pub const INTERACTING_LEVELS: u32 = 3;

#[derive(Debug, Clone)]
pub struct InteractingAutomaton {
    mix_tolerance: f64,
}

impl InteractingAutomaton {
    pub fn new(mix_tolerance: f64) -> Self {
        Self { mix_tolerance }
    }

    pub fn boxed(config: &SimulationConfig) -> Box<dyn Automaton> {
        Box::new(Self::new(config.mix_tolerance))
    }
}

impl Automaton for InteractingAutomaton {
    fn name(&self) -> &'static str {
        "int"
    }

    fn step(&self, grid: &mut Grid, rng: &mut StdRng) {
        let (rows, cols) = grid.dim();
        if rows == 0 || cols == 0 {
            return;
        }
        let cell = (rng.random_range(0..rows), rng.random_range(0..cols));
        if let Some(neighbour) = random_neighbour(cell, (rows, cols), rng) {
            grid.swap(cell, neighbour);
        }
    }

    fn is_terminal(&self, grid: &Grid) -> bool {
        is_mixed(grid, self.mix_tolerance)
    }

    /// One sweep: as many swaps as the lattice has cells.
    fn terminal_check_interval(&self, n: usize) -> u64 {
        (n as u64).saturating_mul(n as u64)
    }

    fn reduction(&self) -> BlockReduction {
        BlockReduction::Bucketed {
            levels: INTERACTING_LEVELS,
        }
    }
}
