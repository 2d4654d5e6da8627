//! Natural cubic spline through a 1D potential profile.
//!
//! Outside the knot range the spline returns the boundary value with zero
//! slope, so an electron that wanders off the fitted domain sees a flat
//! potential instead of an extrapolated one.

use crate::error::{Result, SweepError};

#[derive(Debug, Clone)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots
    m: Vec<f64>,
}

impl CubicSpline {
    /// Build the interpolating spline. Knots must be strictly increasing.
    pub fn new(x: &[f64], y: &[f64]) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SweepError::Config(format!(
                "spline knots ({}) and values ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 2 {
            return Err(SweepError::Config("spline needs at least two knots".into()));
        }
        if let Some(w) = x.windows(2).find(|w| !(w[1] > w[0])) {
            return Err(SweepError::Config(format!(
                "spline knots must be strictly increasing (found {} then {})",
                w[0], w[1]
            )));
        }
        if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(SweepError::Config("spline data contains non-finite values".into()));
        }

        let n = x.len();
        let mut m = vec![0.0; n];
        if n > 2 {
            // Interior second derivatives; natural ends m[0] = m[n-1] = 0.
            let k = n - 2;
            let mut sub = vec![0.0; k];
            let mut diag = vec![0.0; k];
            let mut sup = vec![0.0; k];
            let mut rhs = vec![0.0; k];
            for row in 0..k {
                let i = row + 1;
                let h0 = x[i] - x[i - 1];
                let h1 = x[i + 1] - x[i];
                sub[row] = h0;
                diag[row] = 2.0 * (h0 + h1);
                sup[row] = h1;
                rhs[row] = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
            }
            let interior = thomas_solve(&sub, &diag, &sup, &rhs);
            m[1..n - 1].copy_from_slice(&interior);
        }

        Ok(Self { x: x.to_vec(), y: y.to_vec(), m })
    }

    pub fn knots(&self) -> &[f64] {
        &self.x
    }

    pub fn values(&self) -> &[f64] {
        &self.y
    }

    /// Knot range `(min, max)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.x[0], self.x[self.x.len() - 1])
    }

    /// Interval index `i` with `x[i] <= t <= x[i+1]`; `t` must lie inside the domain.
    fn interval(&self, t: f64) -> usize {
        let upper = self.x.partition_point(|&xi| xi <= t);
        upper.saturating_sub(1).min(self.x.len() - 2)
    }

    pub fn evaluate(&self, t: f64) -> f64 {
        let (lo, hi) = self.domain();
        if t <= lo {
            return self.y[0];
        }
        if t >= hi {
            return self.y[self.y.len() - 1];
        }
        let i = self.interval(t);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.m[i] + (b * b * b - b) * self.m[i + 1]) * h * h / 6.0
    }

    pub fn derivative(&self, t: f64) -> f64 {
        let (lo, hi) = self.domain();
        if t <= lo || t >= hi {
            return 0.0;
        }
        let i = self.interval(t);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - t) / h;
        let b = (t - self.x[i]) / h;
        (self.y[i + 1] - self.y[i]) / h - (3.0 * a * a - 1.0) / 6.0 * h * self.m[i]
            + (3.0 * b * b - 1.0) / 6.0 * h * self.m[i + 1]
    }
}

/// Thomas algorithm for a tridiagonal system.
///
/// `a` is the sub-diagonal (a[0] unused), `c` the super-diagonal (c[n-1] unused).
/// The spline system is strictly diagonally dominant, so no pivoting is needed.
fn thomas_solve(a: &[f64], b: &[f64], c: &[f64], d: &[f64]) -> Vec<f64> {
    let n = d.len();
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];

    c_prime[0] = c[0] / b[0];
    d_prime[0] = d[0] / b[0];
    for i in 1..n {
        let den = b[i] - a[i] * c_prime[i - 1];
        if i < n - 1 {
            c_prime[i] = c[i] / den;
        }
        d_prime[i] = (d[i] - a[i] * d_prime[i - 1]) / den;
    }

    let mut x = vec![0.0; n];
    x[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        x[i] = d_prime[i] - c_prime[i] * x[i + 1];
    }
    x
}
