//! Field module - the external trap potential and its collaborators.

mod traits;
mod spline;
mod profile;
pub mod fit;

pub use traits::{ExternalField, FieldSampler};
pub use spline::CubicSpline;
pub use profile::{construct_symmetric_x, mirror_profile, HarmonicField, MirroredProfile, SampledField};
pub use fit::{electron_frequency, fit_even_poly, EvenPolyFit, TrapFrequency};
