//! Annealing module - local minimization and perturb-and-resolve refinement.

mod traits;
mod lbfgs;
mod annealer;

pub use traits::{IterationObserver, NullObserver, Objective};
pub use lbfgs::{GradientMode, Lbfgs, MinimizeResult, MinimizerStatus};
pub use annealer::{AnnealOutcome, AnnealSchedule, Annealer};
