//! This module defines the core, strongly-typed vocabulary used throughout the
//! coffeematon pipeline.
//!
//! It replaces string-typed selections (backend names, initial-state tags,
//! resolution names) with closed enums that are parsed once, at the boundary,
//! so that an unknown name becomes a `Configuration` error before any simulation
//! work starts.

pub mod backend;
pub mod initial_state;
pub mod resolution;

// Re-export the main types for easier access.
pub use backend::{Backend, PayloadEncoding};
pub use initial_state::InitialState;
pub use resolution::{Resolution, ResolutionCatalogue};
