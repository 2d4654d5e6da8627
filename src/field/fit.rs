//! Even-polynomial fit of the trap profile and the derived electron frequency.
//!
//! The profile near the trap centre is fitted to
//!   U(x) = a0 + a1 x² + a2 x⁴ + ...
//! by linear least squares. The curvature a1 gives a harmonic spring constant
//! and hence a characteristic in-plane electron frequency, which is logged and
//! stored as a diagnostic only.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::constants::{ELECTRON_MASS, ELEMENTARY_CHARGE};
use crate::error::{Result, SweepError};

/// Coefficients `a_j` of `x^(2j)` and their one-sigma uncertainties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvenPolyFit {
    pub coeffs: Vec<f64>,
    pub errors: Vec<f64>,
}

impl EvenPolyFit {
    pub fn evaluate(&self, x: f64) -> f64 {
        let x2 = x * x;
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x2 + c)
    }
}

/// Fit `n_coeffs` even-power coefficients to the samples with `x` in `domain`.
pub fn fit_even_poly(x: &[f64], y: &[f64], n_coeffs: usize, domain: (f64, f64)) -> Result<EvenPolyFit> {
    if x.len() != y.len() {
        return Err(SweepError::Fit("x and y differ in length".into()));
    }
    if n_coeffs == 0 {
        return Err(SweepError::Fit("at least one coefficient is required".into()));
    }
    let (lo, hi) = (domain.0.min(domain.1), domain.0.max(domain.1));
    let points: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter(|&(&xi, _)| xi >= lo && xi <= hi)
        .map(|(&xi, &yi)| (xi, yi))
        .collect();
    if points.len() <= n_coeffs {
        return Err(SweepError::Fit(format!(
            "{} samples inside [{}, {}] cannot determine {} coefficients",
            points.len(),
            lo,
            hi,
            n_coeffs
        )));
    }

    let n = points.len();
    let design = DMatrix::from_fn(n, n_coeffs, |i, j| points[i].0.powi(2 * j as i32));
    let rhs = DVector::from_iterator(n, points.iter().map(|p| p.1));

    let coeffs = design
        .clone()
        .svd(true, true)
        .solve(&rhs, 1e-14)
        .map_err(|e| SweepError::Fit(e.to_string()))?;

    let residual = &rhs - &design * &coeffs;
    let dof = (n - n_coeffs) as f64;
    let sigma2 = residual.norm_squared() / dof;
    let normal = design.transpose() * &design;
    let covariance = normal
        .try_inverse()
        .ok_or_else(|| SweepError::Fit("normal matrix is singular".into()))?
        * sigma2;

    Ok(EvenPolyFit {
        coeffs: coeffs.iter().copied().collect(),
        errors: (0..n_coeffs).map(|j| covariance[(j, j)].abs().sqrt()).collect(),
    })
}

/// Harmonic in-plane electron frequency implied by a profile curvature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrapFrequency {
    pub frequency_hz: f64,
    pub error_hz: f64,
}

/// Electron frequency for an energy curvature `a1` in eV/µm² (per volt of bias).
///
/// Returns `None` when the curvature is not confining.
pub fn electron_frequency(a1: f64, a1_error: f64) -> Option<TrapFrequency> {
    if !(a1 > 0.0) {
        return None;
    }
    let spring = 2.0 * a1 * ELEMENTARY_CHARGE * 1e12;
    let omega = (spring / ELECTRON_MASS).sqrt();
    let frequency_hz = omega / (2.0 * std::f64::consts::PI);
    Some(TrapFrequency {
        frequency_hz,
        error_hz: 0.5 * frequency_hz * a1_error.abs() / a1,
    })
}
