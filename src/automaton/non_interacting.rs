//! The non-interacting variant: particles ignore each other.
//!
//! Each transition moves every cream particle to a uniformly chosen von Neumann
//! neighbour. A particle whose chosen neighbour lies off the lattice stays put.
//! Cells may hold any number of particles.

use rand::rngs::StdRng;

use super::{is_mixed, random_neighbour, Automaton, Grid};
use crate::coarse_grain::BlockReduction;
use crate::config::SimulationConfig;

#[derive(Debug, Clone)]
pub struct NonInteractingAutomaton {
    mix_tolerance: f64,
}

impl NonInteractingAutomaton {
    pub fn new(mix_tolerance: f64) -> Self {
        Self { mix_tolerance }
    }

    pub fn boxed(config: &SimulationConfig) -> Box<dyn Automaton> {
        Box::new(Self::new(config.mix_tolerance))
    }
}

impl Automaton for NonInteractingAutomaton {
    fn name(&self) -> &'static str {
        "nonint"
    }

    fn step(&self, grid: &mut Grid, rng: &mut StdRng) {
        let shape = grid.dim();
        let mut next = Grid::zeros(grid.raw_dim());
        for (cell, &count) in grid.indexed_iter() {
            for _ in 0..count {
                let target = random_neighbour(cell, shape, rng).unwrap_or(cell);
                next[target] += 1;
            }
        }
        *grid = next;
    }

    fn is_terminal(&self, grid: &Grid) -> bool {
        is_mixed(grid, self.mix_tolerance)
    }

    fn reduction(&self) -> BlockReduction {
        BlockReduction::Sum
    }
}
