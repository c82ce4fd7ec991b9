//! The trajectory/complexity pipeline: the engine's stepping loop, its sampling
//! plan, and the worker pool that measures each sampled step.

pub mod engine;
pub mod pool;
pub mod sampling;

pub use engine::{AutomatonState, ComplexitySeries, EnginePhase, StopReason, TrajectoryEngine};
pub use pool::{effective_workers, CompressionJob, WorkerPool, WorkerPoolConfig};
pub use sampling::{AdaptiveSampler, SamplingPlan};

#[cfg(test)]
mod tests;
