//! Total energy of an electron ensemble above the trap.
//!
//! E(r) = V · Σ_i U(x_i, y_i) + Σ_{i<j} k · exp(-r_ij / λ) / r_ij
//!
//! where U is the external energy per volt of bias, V the applied bias, k the
//! Coulomb constant and λ the optional screening length. Coordinates are
//! metres and energies electron-volts unless a different `coulomb_constant`
//! is configured.

use serde::{Deserialize, Serialize};

use crate::anneal::Objective;
use crate::constants::COULOMB_CONSTANT_EV_M;
use crate::field::ExternalField;

/// Parameters of the electron-electron interaction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Prefactor k of k/r (eV·m for SI coordinates)
    pub coulomb_constant: f64,
    /// Exponential screening length λ; `None` disables screening
    pub screening_length: Option<f64>,
    /// Separations below this are clamped
    pub min_separation: f64,
}

impl Default for Interaction {
    fn default() -> Self {
        Self {
            coulomb_constant: COULOMB_CONSTANT_EV_M,
            screening_length: None,
            min_separation: 1e-15,
        }
    }
}

impl Interaction {
    /// Set the screening length. Zero or negative disables screening.
    pub fn with_screening(mut self, length: f64) -> Self {
        self.screening_length = if length > 0.0 { Some(length) } else { None };
        self
    }

    pub fn with_coulomb_constant(mut self, k: f64) -> Self {
        self.coulomb_constant = k;
        self
    }

    /// Pair potential φ(r) and its radial derivative φ'(r).
    #[inline]
    pub fn pair(&self, r: f64) -> (f64, f64) {
        let r = r.max(self.min_separation);
        let k = self.coulomb_constant;
        match self.screening_length {
            Some(l) => {
                let decay = (-r / l).exp();
                (k * decay / r, -k * decay * (1.0 / (r * r) + 1.0 / (l * r)))
            }
            None => (k / r, -k / (r * r)),
        }
    }
}

/// Split of the total energy into its two contributions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnergyBreakdown {
    pub external: f64,
    pub interaction: f64,
}

impl EnergyBreakdown {
    pub fn total(&self) -> f64 {
        self.external + self.interaction
    }
}

/// Energy model for one bias voltage.
///
/// Built once per sweep step and never mutated, so it can be handed to the
/// minimizer as a pure objective.
#[derive(Debug, Clone)]
pub struct PotentialModel<F: ExternalField> {
    field: F,
    voltage: f64,
    interaction: Interaction,
    /// Strip length for the minimum-image convention along y
    periodic_y: Option<f64>,
}

impl<F: ExternalField> PotentialModel<F> {
    pub fn new(field: F, voltage: f64, interaction: Interaction) -> Self {
        Self { field, voltage, interaction, periodic_y: None }
    }

    /// Treat y as periodic with period `box_length` for pair separations.
    pub fn with_periodic_y(mut self, box_length: f64) -> Self {
        self.periodic_y = if box_length > 0.0 { Some(box_length) } else { None };
        self
    }

    pub fn voltage(&self) -> f64 {
        self.voltage
    }

    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    pub fn field(&self) -> &F {
        &self.field
    }

    /// External energy of a single electron at `(x, y)`.
    pub fn external_energy(&self, x: f64, y: f64) -> f64 {
        self.voltage * self.field.value(x, y)
    }

    /// Pair separation `(dx, dy)` from charge j to charge i.
    #[inline]
    fn separation(&self, xi: f64, yi: f64, xj: f64, yj: f64) -> (f64, f64) {
        let dx = xi - xj;
        let mut dy = yi - yj;
        if let Some(l) = self.periodic_y {
            dy -= l * (dy / l).round();
        }
        (dx, dy)
    }

    pub fn energy_breakdown(&self, r: &[f64]) -> EnergyBreakdown {
        let n = r.len() / 2;
        let mut external = 0.0;
        let mut interaction = 0.0;
        for i in 0..n {
            let (xi, yi) = (r[2 * i], r[2 * i + 1]);
            external += self.external_energy(xi, yi);
            for j in (i + 1)..n {
                let (dx, dy) = self.separation(xi, yi, r[2 * j], r[2 * j + 1]);
                interaction += self.interaction.pair(dx.hypot(dy)).0;
            }
        }
        EnergyBreakdown { external, interaction }
    }

    pub fn total_energy(&self, r: &[f64]) -> f64 {
        self.energy_breakdown(r).total()
    }

    pub fn gradient(&self, r: &[f64]) -> Vec<f64> {
        self.energy_and_gradient(r).1
    }

    /// Energy and gradient in a single pass over the pairs.
    pub fn energy_and_gradient(&self, r: &[f64]) -> (f64, Vec<f64>) {
        let n = r.len() / 2;
        let mut grad = vec![0.0; r.len()];
        let mut energy = 0.0;
        for i in 0..n {
            let (xi, yi) = (r[2 * i], r[2 * i + 1]);
            energy += self.external_energy(xi, yi);
            let [gx, gy] = self.field.gradient(xi, yi);
            grad[2 * i] += self.voltage * gx;
            grad[2 * i + 1] += self.voltage * gy;

            for j in (i + 1)..n {
                let (dx, dy) = self.separation(xi, yi, r[2 * j], r[2 * j + 1]);
                let dist = dx.hypot(dy).max(self.interaction.min_separation);
                let (phi, dphi) = self.interaction.pair(dist);
                energy += phi;
                let scale = dphi / dist;
                grad[2 * i] += scale * dx;
                grad[2 * i + 1] += scale * dy;
                grad[2 * j] -= scale * dx;
                grad[2 * j + 1] -= scale * dy;
            }
        }
        (energy, grad)
    }
}

impl<F: ExternalField> Objective for PotentialModel<F> {
    fn energy(&self, r: &[f64]) -> f64 {
        self.total_energy(r)
    }

    fn gradient(&self, r: &[f64]) -> Vec<f64> {
        PotentialModel::gradient(self, r)
    }

    fn energy_and_gradient(&self, r: &[f64]) -> (f64, Vec<f64>) {
        PotentialModel::energy_and_gradient(self, r)
    }
}
