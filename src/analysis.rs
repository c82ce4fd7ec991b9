//! Summaries of finished runs and multi-size sweeps.
//!
//! A summary reduces a complexity series to the quantities the coffee-automaton
//! experiment is about: how long the lattice took to mix, and how high (and
//! when) complexity peaked at each resolution.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::automaton::VariantRegistry;
use crate::config::SimulationConfig;
use crate::error::CoffeeError;
use crate::kernels::BackendRegistry;
use crate::pipeline::{ComplexitySeries, StopReason, TrajectoryEngine};

/// The highest value recorded at one resolution and the first sampled step
/// where it occurred.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ResolutionPeak {
    pub resolution: String,
    pub value: usize,
    pub step: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct TrajectorySummary {
    pub variant: String,
    pub n: usize,
    pub final_step: u64,
    pub stop_reason: Option<StopReason>,
    /// Steps needed to mix. Only set when the run converged.
    pub mixing_time: Option<u64>,
    pub peaks: Vec<ResolutionPeak>,
}

impl TrajectorySummary {
    pub fn from_engine(engine: &TrajectoryEngine) -> Self {
        let final_step = engine.state().step;
        let stop_reason = engine.stop_reason();
        Self {
            variant: engine.variant().to_string(),
            n: engine.state().n,
            final_step,
            stop_reason,
            mixing_time: (stop_reason == Some(StopReason::Converged)).then_some(final_step),
            peaks: peaks(engine.series()),
        }
    }

    pub fn peak(&self, resolution: &str) -> Option<&ResolutionPeak> {
        self.peaks.iter().find(|p| p.resolution == resolution)
    }
}

/// Peak per resolution, in catalogue order. Resolutions with no samples are skipped.
pub fn peaks(series: &ComplexitySeries) -> Vec<ResolutionPeak> {
    series
        .iter()
        .filter_map(|(name, values)| {
            // First maximum wins: fold keeps the earlier index on ties.
            let (idx, &value) = values
                .iter()
                .enumerate()
                .fold(None, |best: Option<(usize, &usize)>, (i, v)| match best {
                    Some((_, b)) if b >= v => best,
                    _ => Some((i, v)),
                })?;
            Some(ResolutionPeak {
                resolution: name.to_string(),
                value,
                step: series.steps()[idx],
            })
        })
        .collect()
}

//==================================================================================
// Sweeps
//==================================================================================

/// Column-oriented results of a sweep over lattice sizes.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepStats {
    pub variant: String,
    pub ns: Vec<usize>,
    /// Final step of each run; the mixing time when the run converged.
    pub mix_times: Vec<u64>,
    pub converged: Vec<bool>,
    /// Per resolution, index-aligned with `ns`. `None` where a run recorded
    /// no rows.
    pub peak_values: BTreeMap<String, Vec<Option<usize>>>,
    pub peak_steps: BTreeMap<String, Vec<Option<u64>>>,
}

impl SweepStats {
    fn record(&mut self, summary: &TrajectorySummary, resolutions: &[String]) {
        self.ns.push(summary.n);
        self.mix_times.push(summary.final_step);
        self.converged.push(summary.mixing_time.is_some());
        for name in resolutions {
            let peak = summary.peak(name);
            self.peak_values
                .entry(name.clone())
                .or_default()
                .push(peak.map(|p| p.value));
            self.peak_steps
                .entry(name.clone())
                .or_default()
                .push(peak.map(|p| p.step));
        }
    }

    /// Default file name, e.g. `stats_int_10_40.json`.
    pub fn file_name(&self) -> String {
        match (self.ns.first(), self.ns.last()) {
            (Some(first), Some(last)) => format!("stats_{}_{}_{}.json", self.variant, first, last),
            _ => format!("stats_{}.json", self.variant),
        }
    }
}

/// Runs `variant` to convergence once per lattice size.
///
/// Every run uses `template` with only `n` replaced.
pub fn sweep(
    template: &SimulationConfig,
    variant: &str,
    variants: &VariantRegistry,
    backends: Arc<BackendRegistry>,
    sizes: impl IntoIterator<Item = usize>,
    max_samples: Option<usize>,
) -> Result<SweepStats, CoffeeError> {
    let mut stats = SweepStats {
        variant: variant.to_string(),
        ..SweepStats::default()
    };
    for n in sizes {
        let config = SimulationConfig {
            n,
            ..template.clone()
        };
        let automaton = variants.create(variant, &config)?;
        let mut engine = TrajectoryEngine::new(config, automaton, Arc::clone(&backends))?;

        let started = std::time::Instant::now();
        engine.run(None, max_samples)?;
        log::info!(
            "sweep {} n={}: stopped at step {} in {:.2?}",
            variant,
            n,
            engine.state().step,
            started.elapsed()
        );

        stats.record(
            &TrajectorySummary::from_engine(&engine),
            engine.series().names(),
        );
    }
    Ok(stats)
}
