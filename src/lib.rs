//! This file is the root of the `coffeematon` Rust crate.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library so the Rust compiler
//!     knows they exist.
//! 2.  Re-exporting the handful of types a caller needs to build and run a
//!     `TrajectoryEngine`.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod analysis;
pub mod automaton;
pub mod coarse_grain;
pub mod complexity;
pub mod config;
pub mod error;
pub mod kernels;
pub mod pipeline;
pub mod store;
pub mod types;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use automaton::{Automaton, VariantRegistry};
pub use config::SimulationConfig;
pub use error::{CoffeeError, Result};
pub use kernels::BackendRegistry;
pub use pipeline::{StopReason, TrajectoryEngine};
pub use types::{Backend, InitialState, PayloadEncoding, Resolution, ResolutionCatalogue};
