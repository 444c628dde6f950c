//! Cross-module tests for the realm core.
//!
//! - `determinism.rs`: same seed and inputs produce identical results, plus
//!   property tests for the combat and stat invariants
//! - `integration.rs`: lifecycle, combat, stats and persistence end to end
//! - `helpers.rs`: fixture catalogs, tunables and managers

mod determinism;
mod helpers;

pub use helpers::*;
