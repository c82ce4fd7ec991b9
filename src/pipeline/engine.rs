//! The trajectory engine: the stepping loop that ties the pipeline together.
//!
//! The engine exclusively owns the automaton state, the complexity series and
//! the store. Only the compression jobs of one sampled step ever run
//! concurrently; everything else happens on the caller's thread, in step order.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::pool::{CompressionJob, WorkerPool, WorkerPoolConfig};
use super::sampling::{AdaptiveSampler, SamplingPlan};
use crate::automaton::{Automaton, Grid};
use crate::coarse_grain::coarse_grain_with;
use crate::complexity::Payload;
use crate::config::SimulationConfig;
use crate::error::CoffeeError;
use crate::kernels::BackendRegistry;
use crate::store::TrajectoryStore;
use crate::types::{InitialState, Resolution, ResolutionCatalogue};

//==================================================================================
// 1. Engine-Owned Data
//==================================================================================

/// The fine-resolution simulation state.
#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonState {
    pub n: usize,
    /// Transitions applied since construction.
    pub step: u64,
    pub grid: Grid,
    pub initial_state: InitialState,
}

/// Complexity values per resolution, index-aligned with the sampled steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComplexitySeries {
    names: Vec<String>,
    steps: Vec<u64>,
    values: Vec<Vec<usize>>,
}

impl ComplexitySeries {
    pub fn new(catalogue: &ResolutionCatalogue) -> Self {
        let names = catalogue.names();
        let values = vec![Vec::new(); names.len()];
        Self {
            names,
            steps: Vec::new(),
            values,
        }
    }

    /// Appends one row. `sizes` is in catalogue order.
    pub(crate) fn push_row(&mut self, step: u64, sizes: &[usize]) {
        debug_assert_eq!(sizes.len(), self.values.len());
        self.steps.push(step);
        for (column, &size) in self.values.iter_mut().zip(sizes) {
            column.push(size);
        }
    }

    /// The sample index: recorded steps in increasing order.
    pub fn steps(&self) -> &[u64] {
        &self.steps
    }

    /// Values recorded for the resolution called `name`.
    pub fn get(&self, name: &str) -> Option<&[usize]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(&self.values[idx])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// `(name, values)` pairs in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(Vec::as_slice))
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    Running,
    Done,
}

/// Why the last `run` call stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The requested number of transitions was applied.
    StepCount,
    /// The variant's termination predicate held.
    Converged,
    /// An unbounded run hit `step_cap` before converging.
    StepCap,
}

//==================================================================================
// 2. The Engine
//==================================================================================

pub struct TrajectoryEngine {
    config: SimulationConfig,
    automaton: Box<dyn Automaton>,
    registry: Arc<BackendRegistry>,
    state: AutomatonState,
    series: ComplexitySeries,
    pool_config: WorkerPoolConfig,
    store: Option<TrajectoryStore>,
    rng: StdRng,
    phase: EnginePhase,
    stop_reason: Option<StopReason>,
}

impl TrajectoryEngine {
    /// Validates `config`, seeds the lattice and sizes the worker pool.
    ///
    /// # Errors
    /// `Configuration` if the config violates an invariant.
    pub fn new(
        config: SimulationConfig,
        automaton: Box<dyn Automaton>,
        registry: Arc<BackendRegistry>,
    ) -> Result<Self, CoffeeError> {
        config.validate()?;

        let grid = automaton.seed(config.n, config.initial_state);
        let state = AutomatonState {
            n: config.n,
            step: 0,
            grid,
            initial_state: config.initial_state,
        };
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let pool_config = WorkerPoolConfig::new(config.requested_workers(), config.n);
        let series = ComplexitySeries::new(&config.resolutions);

        log::debug!(
            "engine ready: variant={} n={} init={} workers={}/{}",
            automaton.name(),
            config.n,
            config.initial_state,
            pool_config.effective,
            pool_config.requested
        );

        Ok(Self {
            config,
            automaton,
            registry,
            state,
            series,
            pool_config,
            store: None,
            rng,
            phase: EnginePhase::Running,
            stop_reason: None,
        })
    }

    /// Replaces the default file sink with `store`.
    pub fn with_store(mut self, store: TrajectoryStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Advances the automaton, sampling complexity along the way.
    ///
    /// With `step_count` exactly that many transitions are applied and rows
    /// are recorded at the fixed stride of `SamplingPlan`. Without it the run
    /// continues until the variant reports a terminal state or `step_cap`
    /// transitions have been applied; with `max_samples` set, the states of such
    /// a run are thinned by an `AdaptiveSampler` and measured once it stops.
    ///
    /// Returns the store's file path when rows are persisted to a file.
    ///
    /// # Errors
    /// `BackendUnavailable` or `Configuration` before any transition;
    /// `WorkerPool` or `Persistence` from the sampled step that failed. Rows
    /// persisted before a failure remain valid.
    pub fn run(
        &mut self,
        step_count: Option<u64>,
        max_samples: Option<usize>,
    ) -> Result<Option<PathBuf>, CoffeeError> {
        self.registry.resolve(self.config.compression)?;
        let horizon = step_count.unwrap_or(self.config.step_cap);
        let plan = SamplingPlan::new(horizon, max_samples)?;
        let mut deferred = match (step_count, max_samples) {
            (None, Some(limit)) => Some(AdaptiveSampler::<(u64, Grid)>::new(limit)),
            _ => None,
        };
        let check_every = self
            .automaton
            .terminal_check_interval(self.state.n)
            .max(1);

        if self.config.save && self.store.is_none() {
            self.store = Some(self.open_default_store()?);
        }

        self.phase = EnginePhase::Running;
        self.stop_reason = None;
        let pool = WorkerPool::new(self.pool_config)?;

        log::info!(
            "running {} (n={}, {}) from step {}: horizon={} stride={} workers={}",
            self.automaton.name(),
            self.state.n,
            self.config.compression,
            self.state.step,
            horizon,
            match deferred {
                Some(_) => "adaptive".to_string(),
                None => plan.stride().to_string(),
            },
            pool.config().effective
        );

        let mut k: u64 = 0;
        let reason = loop {
            if step_count.is_none()
                && k % check_every == 0
                && self.automaton.is_terminal(&self.state.grid)
            {
                break StopReason::Converged;
            }
            if k == horizon {
                break match step_count {
                    Some(_) => StopReason::StepCount,
                    None => {
                        log::warn!(
                            "{} (n={}) did not mix within {} steps; stopping at step {}",
                            self.automaton.name(),
                            self.state.n,
                            horizon,
                            self.state.step
                        );
                        StopReason::StepCap
                    }
                };
            }

            self.automaton.step(&mut self.state.grid, &mut self.rng);
            self.state.step += 1;
            k += 1;

            match deferred.as_mut() {
                Some(sampler) => {
                    if sampler.wants(k) {
                        sampler.offer(k, (self.state.step, self.state.grid.clone()));
                    }
                }
                None => {
                    if plan.should_sample(k) {
                        let sizes = self.measure(&pool, &self.state.grid)?;
                        self.record(self.state.step, &sizes)?;
                    }
                }
            }
        };

        if let Some(sampler) = deferred {
            for (_, (step, grid)) in sampler.finish() {
                let sizes = self.measure(&pool, &grid)?;
                self.record(step, &sizes)?;
            }
        }

        self.phase = EnginePhase::Done;
        self.stop_reason = Some(reason);
        log::info!(
            "{} stopped at step {} ({:?}), {} samples recorded",
            self.automaton.name(),
            self.state.step,
            reason,
            self.series.len()
        );

        Ok(self
            .store
            .as_ref()
            .and_then(|s| s.location().map(Path::to_path_buf)))
    }

    /// Measures every catalogued resolution of `grid` as one pool batch.
    fn measure(&self, pool: &WorkerPool, grid: &Grid) -> Result<Vec<usize>, CoffeeError> {
        let reduction = self.automaton.reduction();
        let encoding = self.config.encoding;
        let backend = self.config.compression;
        let fine = grid.view();

        let jobs = self
            .config
            .resolutions
            .iter()
            .map(|resolution| -> Result<CompressionJob, CoffeeError> {
                let payload = match *resolution {
                    Resolution::Fine => Payload::encode(&fine, encoding)?,
                    Resolution::Coarse { block } => {
                        let coarse = coarse_grain_with(&fine, block, reduction)?;
                        Payload::encode(&coarse.view(), encoding)?
                    }
                };
                Ok(CompressionJob::new(payload, backend))
            })
            .collect::<Result<Vec<_>, CoffeeError>>()?;

        let batch = self.series.len() as u64;
        pool.run(batch, &jobs, &self.registry)
    }

    /// Persists one row, then appends it to the series.
    fn record(&mut self, step: u64, sizes: &[usize]) -> Result<(), CoffeeError> {
        if let Some(store) = self.store.as_mut() {
            store.append(step, sizes)?;
        }
        self.series.push_row(step, sizes);

        log_metric!(
            "event" = "sample",
            "step" = &step,
            "sizes" = &format!("{:?}", sizes)
        );
        Ok(())
    }

    fn open_default_store(&self) -> Result<TrajectoryStore, CoffeeError> {
        let dir = &self.config.output_dir;
        std::fs::create_dir_all(dir).map_err(|source| CoffeeError::Persistence {
            location: dir.display().to_string(),
            source,
        })?;
        let path = dir.join(TrajectoryStore::default_file_name(
            self.automaton.name(),
            self.state.initial_state.as_str(),
            self.state.n,
        ));
        log::info!("writing trajectory to {}", path.display());
        TrajectoryStore::create(&path, &self.config.resolutions)
    }

    pub fn state(&self) -> &AutomatonState {
        &self.state
    }

    pub fn series(&self) -> &ComplexitySeries {
        &self.series
    }

    pub fn workers(&self) -> WorkerPoolConfig {
        self.pool_config
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    /// `None` until a `run` call has completed.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn variant(&self) -> &str {
        self.automaton.name()
    }
}

impl std::fmt::Debug for TrajectoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrajectoryEngine")
            .field("variant", &self.automaton.name())
            .field("n", &self.state.n)
            .field("step", &self.state.step)
            .field("samples", &self.series.len())
            .field("workers", &self.pool_config)
            .field("phase", &self.phase)
            .finish()
    }
}
