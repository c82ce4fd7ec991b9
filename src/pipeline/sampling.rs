//! Which transitions of a run get recorded.

use crate::error::CoffeeError;

/// Fixed-stride sampling over a run's horizon.
///
/// Transitions of one `run` call are counted `k = 1, 2, …`; the state after
/// transition `k` is recorded iff `k % stride == 0`. The state before the first
/// transition is never recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    horizon: u64,
    stride: u64,
}

impl SamplingPlan {
    /// Builds the plan for a run of `horizon` transitions that should record at
    /// most `max_samples` rows. Without a limit every transition is recorded.
    ///
    /// # Errors
    /// `Configuration` if `max_samples` is `Some(0)`.
    pub fn new(horizon: u64, max_samples: Option<usize>) -> Result<Self, CoffeeError> {
        let stride = match max_samples {
            Some(0) => {
                return Err(CoffeeError::Configuration(
                    "max_samples must be at least 1".to_string(),
                ))
            }
            Some(m) => horizon.div_ceil(m as u64).max(1),
            None => 1,
        };
        Ok(Self { horizon, stride })
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    pub fn horizon(&self) -> u64 {
        self.horizon
    }

    pub fn should_sample(&self, k: u64) -> bool {
        k > 0 && k % self.stride == 0
    }

    /// Rows a run that reaches its full horizon records.
    pub fn expected_samples(&self) -> u64 {
        self.horizon / self.stride
    }
}

/// Thinning sampler for runs whose length is not known in advance.
///
/// Candidates are offered at multiples of the current stride. Once `2 * limit`
/// are buffered, every other one is dropped and the stride doubles, so the
/// buffer always covers the run so far at a uniform spacing. `finish` thins the
/// buffer to at most `limit` entries.
#[derive(Debug, Clone)]
pub struct AdaptiveSampler<T> {
    limit: usize,
    stride: u64,
    entries: Vec<(u64, T)>,
}

impl<T> AdaptiveSampler<T> {
    /// `limit` is clamped to at least one.
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            limit,
            stride: 1,
            entries: Vec::with_capacity(2 * limit),
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Whether transition `k` should be offered.
    pub fn wants(&self, k: u64) -> bool {
        k > 0 && k % self.stride == 0
    }

    pub fn offer(&mut self, k: u64, value: T) {
        self.entries.push((k, value));
        if self.entries.len() >= 2 * self.limit {
            let wider = self.stride * 2;
            self.entries.retain(|(k, _)| k % wider == 0);
            self.stride = wider;
        }
    }

    /// The kept entries, oldest first. Non-empty whenever anything was offered.
    pub fn finish(self) -> Vec<(u64, T)> {
        let count = self.entries.len();
        if count <= self.limit {
            return self.entries;
        }
        let every = count.div_ceil(self.limit);
        self.entries
            .into_iter()
            .enumerate()
            .filter(|(i, _)| (i + 1) % every == 0)
            .map(|(_, entry)| entry)
            .collect()
    }
}
