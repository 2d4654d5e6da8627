//! Monitor module - convergence traces, snapshot frames and trap classification.

mod convergence;
mod snapshot;

pub use convergence::{ConvergenceMonitor, GradientNorms, TraceSample};
pub use snapshot::{check_unbounded_electrons, count_frames, make_movie, PngSnapshotWriter, Rect, SnapshotRenderer, TrapClassifier};
