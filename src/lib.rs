//! Resonator annealing - equilibrium electron configurations above a resonator trap
//!
//! This crate finds the classical ground-state arrangement of an electron
//! ensemble floating above a resonator electrode for a sweep of bias voltages.
//! Each step minimizes the total energy (external trap potential plus screened
//! Coulomb repulsion) with L-BFGS, refines it with perturb-and-resolve rounds,
//! and warm-starts the next voltage from the result.

pub mod constants;
pub mod error;
pub mod field;
pub mod potential;
pub mod anneal;
pub mod monitor;
pub mod io;
pub mod sweep;

// Re-export commonly used types at crate root
pub use error::{Result, SweepError};
pub use field::{ExternalField, FieldSampler, HarmonicField, MirroredProfile, SampledField};
pub use potential::{r2xy, xy2r, Interaction, PotentialModel, YDomain};
pub use anneal::{AnnealOutcome, AnnealSchedule, Annealer, IterationObserver, Lbfgs, MinimizeResult, MinimizerStatus, Objective};
pub use monitor::{check_unbounded_electrons, ConvergenceMonitor, PngSnapshotWriter, Rect, SnapshotRenderer, TrapClassifier};
pub use io::{read_sweep_config, ResultStore, StepRecord, StoreReader, SweepConfig, SweepMetadata};
pub use sweep::{get_rectangular_initial_condition, run_sweep, run_sweep_with_field, SweepContext, SweepSummary};

#[cfg(test)]
mod tests;
