//! Internal utilities for the runtime core.
//!
//! These utilities are intentionally minimal and dependency-free so that
//! test runs stay deterministic.

pub mod det_rng;

pub use det_rng::DetRng;
