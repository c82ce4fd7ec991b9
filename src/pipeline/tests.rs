use super::*;
use crate::automaton::{
    Automaton, Grid, InteractingAutomaton, NonInteractingAutomaton, VariantRegistry,
};
use crate::coarse_grain::BlockReduction;
use crate::config::SimulationConfig;
use crate::error::CoffeeError;
use crate::kernels::BackendRegistry;
use crate::store::{read_file, read_rows, TrajectoryStore};
use crate::types::{Backend, InitialState, PayloadEncoding, Resolution, ResolutionCatalogue};
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::{Arc, Mutex};

//==================================================================================
// Helpers
//==================================================================================

fn config(n: usize) -> SimulationConfig {
    let mut config = SimulationConfig::new(n);
    config.save = false;
    config.seed = Some(1);
    config
}

fn engine(config: SimulationConfig) -> TrajectoryEngine {
    let automaton = InteractingAutomaton::boxed(&config);
    TrajectoryEngine::new(config, automaton, Arc::new(BackendRegistry::detect())).unwrap()
}

/// Counts transitions in cell (0, 0); terminal once the count reaches `target`.
#[derive(Debug)]
struct Counter {
    target: Option<u32>,
    check_every: u64,
}

impl Counter {
    fn until(target: u32) -> Box<Self> {
        Box::new(Self {
            target: Some(target),
            check_every: 1,
        })
    }

    fn endless() -> Box<Self> {
        Box::new(Self {
            target: None,
            check_every: 1,
        })
    }
}

impl Automaton for Counter {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn seed(&self, n: usize, _initial: InitialState) -> Grid {
        Grid::zeros((n, n))
    }

    fn step(&self, grid: &mut Grid, _rng: &mut StdRng) {
        grid[(0, 0)] += 1;
    }

    fn is_terminal(&self, grid: &Grid) -> bool {
        self.target.is_some_and(|t| grid[(0, 0)] >= t)
    }

    fn terminal_check_interval(&self, _n: usize) -> u64 {
        self.check_every
    }

    fn reduction(&self) -> BlockReduction {
        BlockReduction::Sum
    }
}

/// Accepts the header plus `rows` row writes, then fails every write.
#[derive(Clone)]
struct FailingSink {
    buffer: Arc<Mutex<Vec<u8>>>,
    writes_left: Arc<Mutex<usize>>,
}

impl FailingSink {
    fn after_rows(rows: usize) -> Self {
        Self {
            buffer: Arc::default(),
            writes_left: Arc::new(Mutex::new(rows + 1)),
        }
    }

    fn contents(&self) -> Vec<u8> {
        self.buffer.lock().unwrap().clone()
    }
}

impl Write for FailingSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut left = self.writes_left.lock().unwrap();
        if *left == 0 {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        }
        *left -= 1;
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//==================================================================================
// Bounded runs
//==================================================================================

#[test]
fn test_bounded_run_samples_every_step() {
    let mut config = config(10);
    config.workers = Some(8);
    config.compression = Backend::Gzip;
    let mut engine = engine(config);

    assert_eq!(engine.workers().effective, 1);
    let location = engine.run(Some(10), None).unwrap();

    assert!(location.is_none());
    assert_eq!(engine.state().step, 10);
    assert_eq!(engine.phase(), EnginePhase::Done);
    assert_eq!(engine.stop_reason(), Some(StopReason::StepCount));
    assert_eq!(engine.series().steps(), (1..=10).collect::<Vec<u64>>().as_slice());
    for (name, values) in engine.series().iter() {
        assert_eq!(values.len(), 10, "resolution {}", name);
    }
    // coarse_7 of a 10x10 lattice is a single cell, which still compresses to
    // a non-empty gzip stream.
    assert!(engine.series().get("coarse_7").unwrap().iter().all(|&v| v > 0));
}

#[test]
fn test_non_positive_workers_run_sequentially() {
    for workers in [0, -4] {
        let mut config = config(64);
        config.workers = Some(workers);
        let mut engine = engine(config);
        assert_eq!(engine.workers(), WorkerPoolConfig { requested: 1, effective: 1 });
        engine.run(Some(3), None).unwrap();
        assert_eq!(engine.series().len(), 3);
    }
}

#[test]
fn test_max_samples_sets_the_stride() {
    let mut engine = engine(config(10));
    engine.run(Some(10), Some(3)).unwrap();
    assert_eq!(engine.series().steps(), &[4, 8]);
    assert_eq!(engine.state().step, 10);
}

#[test]
fn test_zero_max_samples_fails_before_any_step() {
    let mut engine = engine(config(10));
    assert!(matches!(
        engine.run(Some(10), Some(0)),
        Err(CoffeeError::Configuration(_))
    ));
    assert_eq!(engine.state().step, 0);
}

#[test]
fn test_repeated_runs_extend_the_series() {
    let mut engine = engine(config(10));
    engine.run(Some(5), None).unwrap();
    engine.run(Some(5), Some(1)).unwrap();
    assert_eq!(engine.state().step, 10);
    assert_eq!(engine.series().steps(), &[1, 2, 3, 4, 5, 10]);
}

#[test]
fn test_parallel_and_sequential_runs_agree() {
    let run = |workers: i64| {
        let mut config = config(40);
        config.workers = Some(workers);
        config.seed = Some(99);
        config.resolutions = ResolutionCatalogue::new(vec![
            Resolution::Fine,
            Resolution::Coarse { block: 2 },
            Resolution::Coarse { block: 4 },
            Resolution::Coarse { block: 8 },
        ])
        .unwrap();
        let mut engine = engine(config);
        engine.run(Some(20), Some(5)).unwrap();
        (engine.workers().effective, engine.series().clone())
    };
    let (parallel_workers, parallel) = run(4);
    let (sequential_workers, sequential) = run(1);
    assert_eq!(parallel_workers, 4);
    assert_eq!(sequential_workers, 1);
    assert_eq!(parallel, sequential);
}

#[test]
fn test_same_seed_reproduces_trajectory() {
    let run = || {
        let mut config = config(12);
        config.seed = Some(7);
        config.initial_state = InitialState::Circular;
        let mut engine = engine(config);
        engine.run(Some(200), Some(10)).unwrap();
        (engine.state().grid.clone(), engine.series().clone())
    };
    assert_eq!(run(), run());
}

#[test]
fn test_bounded_run_on_every_backend_variant_and_pool_size() {
    let registry = Arc::new(BackendRegistry::detect());
    let variants = VariantRegistry::builtin();
    for backend in registry.available() {
        for variant in ["int", "nonint"] {
            for workers in [1i64, 4] {
                let mut config = config(32);
                config.compression = backend;
                config.workers = Some(workers);
                let automaton = variants.create(variant, &config).unwrap();
                let mut engine =
                    TrajectoryEngine::new(config, automaton, Arc::clone(&registry)).unwrap();
                let expected_workers = if workers == 1 { 1 } else { 3 };
                assert_eq!(engine.workers().effective, expected_workers);

                engine.run(Some(10), None).unwrap();
                let label = format!("{} {} workers={}", backend, variant, workers);
                assert_eq!(engine.state().step, 10, "{}", label);
                assert_eq!(engine.series().len(), 10, "{}", label);
                for (name, values) in engine.series().iter() {
                    assert_eq!(values.len(), 10, "{} {}", label, name);
                    assert!(values.iter().all(|&v| v > 0), "{} {}", label, name);
                }
            }
        }
    }
}

#[test]
fn test_text_encoding_is_measured() {
    let mut config = config(14);
    config.encoding = PayloadEncoding::Text;
    let mut engine = engine(config);
    engine.run(Some(4), None).unwrap();
    assert!(engine.series().get("fine").unwrap().iter().all(|&v| v > 0));
}

#[test]
fn test_nonint_variant_runs_through_the_pipeline() {
    let config = config(21);
    let automaton = NonInteractingAutomaton::boxed(&config);
    let mut engine =
        TrajectoryEngine::new(config, automaton, Arc::new(BackendRegistry::detect())).unwrap();
    engine.run(Some(6), Some(3)).unwrap();
    assert_eq!(engine.variant(), "nonint");
    assert_eq!(engine.series().steps(), &[2, 4, 6]);
    assert_eq!(engine.state().grid.sum(), 21 * 10);
}

//==================================================================================
// Selection errors
//==================================================================================

#[test]
fn test_missing_backend_fails_before_first_step() {
    let mut config = config(10);
    config.compression = Backend::Zstd;
    let automaton = InteractingAutomaton::boxed(&config);
    let registry = Arc::new(BackendRegistry::detect().without(Backend::Zstd));
    let mut engine = TrajectoryEngine::new(config, automaton, registry).unwrap();

    match engine.run(Some(10), None) {
        Err(CoffeeError::BackendUnavailable(backend)) => assert_eq!(backend, Backend::Zstd),
        other => panic!("expected BackendUnavailable, got {:?}", other),
    }
    assert_eq!(engine.state().step, 0);
    assert!(engine.series().is_empty());
    assert_eq!(engine.stop_reason(), None);
}

#[test]
fn test_zero_lattice_is_rejected_at_construction() {
    let config = SimulationConfig::new(0);
    let automaton = InteractingAutomaton::boxed(&config);
    assert!(matches!(
        TrajectoryEngine::new(config, automaton, Arc::new(BackendRegistry::detect())),
        Err(CoffeeError::Configuration(_))
    ));
}

//==================================================================================
// Unbounded runs
//==================================================================================

#[test]
fn test_unbounded_run_stops_when_converged() {
    let config = config(4);
    let registry = Arc::new(BackendRegistry::detect());
    let mut engine =
        TrajectoryEngine::new(config, Counter::until(25), registry).unwrap();

    engine.run(None, None).unwrap();
    assert_eq!(engine.stop_reason(), Some(StopReason::Converged));
    assert_eq!(engine.state().step, 25);
    assert_eq!(engine.series().len(), 25);
}

#[test]
fn test_unbounded_run_stops_at_step_cap() {
    let mut config = config(4);
    config.step_cap = 50;
    let registry = Arc::new(BackendRegistry::detect());
    let mut engine =
        TrajectoryEngine::new(config, Counter::endless(), registry).unwrap();

    engine.run(None, Some(5)).unwrap();
    assert_eq!(engine.stop_reason(), Some(StopReason::StepCap));
    assert_eq!(engine.state().step, 50);
    assert_eq!(engine.series().steps(), &[16, 32, 48]);
}

#[test]
fn test_unbounded_run_with_sample_limit_records_thinned_rows() {
    let registry = Arc::new(BackendRegistry::detect());
    let mut engine = TrajectoryEngine::new(config(4), Counter::until(25), registry).unwrap();

    engine.run(None, Some(5)).unwrap();
    assert_eq!(engine.stop_reason(), Some(StopReason::Converged));
    assert_eq!(engine.state().step, 25);
    assert_eq!(engine.series().steps(), &[8, 16, 24]);
    for (_, values) in engine.series().iter() {
        assert_eq!(values.len(), 3);
    }
}

#[test]
fn test_unbounded_run_with_single_sample_records_one_row() {
    let registry = Arc::new(BackendRegistry::detect());
    let mut engine = TrajectoryEngine::new(config(4), Counter::until(3), registry).unwrap();
    engine.run(None, Some(1)).unwrap();
    assert_eq!(engine.series().len(), 1);
}

#[test]
fn test_convergence_is_checked_at_the_variant_interval() {
    let registry = Arc::new(BackendRegistry::detect());
    let counter = Box::new(Counter {
        target: Some(25),
        check_every: 10,
    });
    let mut engine = TrajectoryEngine::new(config(4), counter, registry).unwrap();
    engine.run(None, None).unwrap();
    assert_eq!(engine.stop_reason(), Some(StopReason::Converged));
    assert_eq!(engine.state().step, 30);
}

#[test]
fn test_already_mixed_state_takes_no_steps() {
    let registry = Arc::new(BackendRegistry::detect());
    let mut engine =
        TrajectoryEngine::new(config(4), Counter::until(0), registry).unwrap();
    engine.run(None, None).unwrap();
    assert_eq!(engine.state().step, 0);
    assert!(engine.series().is_empty());
}

//==================================================================================
// Persistence
//==================================================================================

#[test]
fn test_rows_before_a_sink_failure_stay_durable() {
    let sink = FailingSink::after_rows(3);
    let config = config(10);
    let store = TrajectoryStore::from_writer(Box::new(sink.clone()), &config.resolutions).unwrap();
    let mut engine = engine(config).with_store(store);

    match engine.run(Some(10), None) {
        Err(CoffeeError::Persistence { .. }) => {}
        other => panic!("expected Persistence error, got {:?}", other),
    }

    let stored = read_rows(sink.contents().as_slice()).unwrap();
    assert_eq!(stored.rows.len(), 3);
    assert_eq!(engine.series().len(), 3);
    assert_eq!(engine.state().step, 4);
    let persisted: Vec<u64> = stored.rows.iter().map(|r| r.step).collect();
    assert_eq!(persisted.as_slice(), engine.series().steps());
}

#[test]
fn test_retry_after_sink_failure_keeps_store_and_series_aligned() {
    let sink = FailingSink::after_rows(2);
    let config = config(10);
    let store = TrajectoryStore::from_writer(Box::new(sink.clone()), &config.resolutions).unwrap();
    let mut engine = engine(config).with_store(store);

    assert!(engine.run(Some(5), None).is_err());
    *sink.writes_left.lock().unwrap() = 10;
    assert!(matches!(
        engine.run(Some(5), None),
        Err(CoffeeError::Persistence { .. })
    ));

    let stored = read_rows(sink.contents().as_slice()).unwrap();
    let persisted: Vec<u64> = stored.rows.iter().map(|r| r.step).collect();
    assert_eq!(persisted, vec![1, 2]);
    assert_eq!(engine.series().steps(), &[1, 2]);
}

#[test]
fn test_default_store_lands_in_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(10);
    config.save = true;
    config.output_dir = dir.path().join("results");
    let mut engine = engine(config);

    let path = engine.run(Some(6), Some(3)).unwrap().unwrap();
    assert_eq!(path, dir.path().join("results").join("int_updown_n10.csv"));

    let stored = read_file(&path).unwrap();
    assert_eq!(stored.columns, engine.series().names());
    assert_eq!(stored.column("fine").unwrap(), engine.series().get("fine").unwrap());
    assert_eq!(stored.rows.len(), 3);
}
