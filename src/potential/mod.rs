//! Potential module - the energy of an electron ensemble and its coordinates.

mod coords;
mod model;

pub use coords::{r2xy, xy2r, YDomain};
pub use model::{EnergyBreakdown, Interaction, PotentialModel};
