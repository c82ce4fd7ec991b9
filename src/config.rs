// In: src/config.rs

//! The single source of truth for all simulation configuration.
//!
//! `SimulationConfig` is created once at the application boundary (CLI flags or
//! a JSON file) and then handed to the `TrajectoryEngine`, which keeps it
//! read-only for the lifetime of the run. Every field the CLI does not set falls
//! back to the serde defaults below, so a minimal JSON config is just `{"n": 50}`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoffeeError;
use crate::types::{Backend, InitialState, PayloadEncoding, ResolutionCatalogue};

//==================================================================================
// I. Defaults
//==================================================================================

/// Lattice side used by `SimulationConfig::default()`.
pub const DEFAULT_LATTICE_SIZE: usize = 100;

/// Upper bound on transitions for a run with no explicit step count.
///
/// A run that has not converged by then stops with `StopReason::StepCap`.
pub const DEFAULT_STEP_CAP: u64 = 10_000_000;

/// Absolute per-cell density tolerance of the mixing predicate.
pub const DEFAULT_MIX_TOLERANCE: f64 = 0.1;

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_step_cap() -> u64 {
    DEFAULT_STEP_CAP
}

fn default_mix_tolerance() -> f64 {
    DEFAULT_MIX_TOLERANCE
}

//==================================================================================
// II. The Unified SimulationConfig
//==================================================================================

/// The single, unified configuration for one trajectory run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct SimulationConfig {
    /// Lattice side length. The fine state is an `n × n` grid.
    pub n: usize,

    /// Seeding pattern for step 0.
    #[serde(default)]
    pub initial_state: InitialState,

    /// Worker count as supplied by the caller. `None` means "one per available
    /// core"; zero or negative values are clamped to 1.
    #[serde(default)]
    pub workers: Option<i64>,

    /// Compression backend used for every complexity estimate of the run.
    #[serde(default)]
    pub compression: Backend,

    /// Serialization path used for every complexity estimate of the run.
    #[serde(default)]
    pub encoding: PayloadEncoding,

    /// Resolutions sampled at each recorded step, in column order.
    #[serde(default)]
    pub resolutions: ResolutionCatalogue,

    /// Seed for the automaton's random number generator. `None` draws from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,

    /// If true, sampled rows are persisted to a CSV file under `output_dir`.
    #[serde(default = "default_true")]
    pub save: bool,

    /// Directory for the trajectory store when `save` is set.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Safety cap on transitions for runs that wait for convergence.
    #[serde(default = "default_step_cap")]
    pub step_cap: u64,

    /// Tolerance of the mixing predicate (see `automaton::is_mixed`).
    #[serde(default = "default_mix_tolerance")]
    pub mix_tolerance: f64,
}

impl SimulationConfig {
    /// A config for an `n × n` lattice with every other field at its default.
    pub fn new(n: usize) -> Self {
        Self {
            n,
            initial_state: InitialState::default(),
            workers: None,
            compression: Backend::default(),
            encoding: PayloadEncoding::default(),
            resolutions: ResolutionCatalogue::default(),
            seed: None,
            save: true,
            output_dir: default_output_dir(),
            step_cap: default_step_cap(),
            mix_tolerance: default_mix_tolerance(),
        }
    }

    /// Loads a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, CoffeeError> {
        let text = std::fs::read_to_string(path)?;
        let config: SimulationConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Checks every invariant that cannot be expressed in the field types.
    pub fn validate(&self) -> Result<(), CoffeeError> {
        if self.n == 0 {
            return Err(CoffeeError::Configuration(
                "lattice size n must be positive".to_string(),
            ));
        }
        if self.step_cap == 0 {
            return Err(CoffeeError::Configuration(
                "step_cap must be positive".to_string(),
            ));
        }
        if !self.mix_tolerance.is_finite() || self.mix_tolerance < 0.0 {
            return Err(CoffeeError::Configuration(format!(
                "mix_tolerance must be a non-negative finite number, got {}",
                self.mix_tolerance
            )));
        }
        Ok(())
    }

    /// The caller's worker count after clamping to at least one.
    pub fn requested_workers(&self) -> usize {
        match self.workers {
            Some(w) if w < 1 => 1,
            Some(w) => usize::try_from(w).unwrap_or(usize::MAX),
            None => std::thread::available_parallelism()
                .map(|p| p.get())
                .unwrap_or(1),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self::new(DEFAULT_LATTICE_SIZE)
    }
}
