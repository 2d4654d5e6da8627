//! Sweep module - initial placement, field setup and the voltage sweep driver.

mod initial;
mod setup;
mod driver;

pub use initial::{get_rectangular_initial_condition, validate_geometry};
pub use setup::{build_field, linspace, FieldSummary, TrapField};
pub use driver::{figures_dir, run_sweep, run_sweep_with_field, trace_path, SweepContext, SweepPhase, SweepSummary};
