//! Concrete fields: the mirrored resonator profile, a sampled cross-section
//! grid and an analytic harmonic trap.

use super::spline::CubicSpline;
use super::traits::{ExternalField, FieldSampler};
use crate::error::{Result, SweepError};

/// One-sided sampling grid from `x0 < 0` up to `-dx/2`.
///
/// The spacing `dx = |x0| / (k - 0.5)` is chosen so that the grid mirrored
/// about x = 0 is uniform and never contains x = 0 twice.
pub fn construct_symmetric_x(x0: f64, k: usize) -> Vec<f64> {
    if k == 0 {
        return Vec::new();
    }
    let x0 = -x0.abs();
    let dx = x0.abs() / (k as f64 - 0.5);
    (0..k).map(|i| x0 + i as f64 * dx).collect()
}

/// Mirror a half profile (x <= 0) about x = 0.
///
/// Returns `(x_symmetric, values_symmetric)` sorted by increasing x. A knot
/// lying exactly on x = 0 is kept once.
pub fn mirror_profile(x_half: &[f64], values_half: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = x_half
        .iter()
        .copied()
        .zip(values_half.iter().copied())
        .collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut xs: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let mut vs: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    for &(x, v) in pairs.iter().rev() {
        if x == 0.0 {
            continue;
        }
        xs.push(-x);
        vs.push(v);
    }
    (xs, vs)
}

/// Potential profile that depends only on x, symmetric about x = 0.
///
/// This is the in-plane energy landscape of a resonator strip whose length
/// runs along y.
#[derive(Debug, Clone)]
pub struct MirroredProfile {
    spline: CubicSpline,
}

impl MirroredProfile {
    /// Build from the x <= 0 half of the profile.
    pub fn from_half(x_half: &[f64], values_half: &[f64]) -> Result<Self> {
        if x_half.iter().any(|&x| x > 0.0) {
            return Err(SweepError::Config(
                "half profile must only contain x <= 0 samples".into(),
            ));
        }
        let (xs, vs) = mirror_profile(x_half, values_half);
        Ok(Self { spline: CubicSpline::new(&xs, &vs)? })
    }

    /// Build from an already symmetric, strictly increasing profile.
    pub fn from_symmetric(xs: &[f64], values: &[f64]) -> Result<Self> {
        Ok(Self { spline: CubicSpline::new(xs, values)? })
    }

    pub fn xs(&self) -> &[f64] {
        self.spline.knots()
    }

    pub fn values(&self) -> &[f64] {
        self.spline.values()
    }

    pub fn domain(&self) -> (f64, f64) {
        self.spline.domain()
    }
}

impl ExternalField for MirroredProfile {
    fn value(&self, x: f64, _y: f64) -> f64 {
        self.spline.evaluate(x)
    }

    fn gradient(&self, x: f64, _y: f64) -> [f64; 2] {
        [self.spline.derivative(x), 0.0]
    }
}

/// Analytic harmonic trap `kx·x² + ky·y²`.
#[derive(Debug, Clone, Copy)]
pub struct HarmonicField {
    pub kx: f64,
    pub ky: f64,
}

impl ExternalField for HarmonicField {
    fn value(&self, x: f64, y: f64) -> f64 {
        self.kx * x * x + self.ky * y * y
    }

    fn gradient(&self, x: f64, y: f64) -> [f64; 2] {
        [2.0 * self.kx * x, 2.0 * self.ky * y]
    }
}

/// Potential sampled on a regular (x, height) grid, bilinearly interpolated.
///
/// Queries are clamped to the grid. A grid with a single height row behaves
/// as a height-independent profile.
#[derive(Debug, Clone)]
pub struct SampledField {
    xs: Vec<f64>,
    heights: Vec<f64>,
    /// Row-major, `values[iz * xs.len() + ix]`
    values: Vec<f64>,
}

impl SampledField {
    /// Assemble a grid from scattered `(x, height, value)` samples.
    ///
    /// The samples must cover every combination of their distinct x and
    /// height coordinates exactly once.
    pub fn from_samples(samples: &[(f64, f64, f64)]) -> Result<Self> {
        let mut xs: Vec<f64> = samples.iter().map(|s| s.0).collect();
        let mut heights: Vec<f64> = samples.iter().map(|s| s.1).collect();
        xs.sort_by(f64::total_cmp);
        xs.dedup();
        heights.sort_by(f64::total_cmp);
        heights.dedup();

        if xs.len() < 2 {
            return Err(SweepError::Config("field grid needs at least two x samples".into()));
        }
        if xs.len() * heights.len() != samples.len() {
            return Err(SweepError::Config(format!(
                "field samples do not form a regular grid ({} x positions, {} heights, {} samples)",
                xs.len(),
                heights.len(),
                samples.len()
            )));
        }

        let nx = xs.len();
        let mut values = vec![f64::NAN; nx * heights.len()];
        for &(x, z, v) in samples {
            let ix = xs.partition_point(|&xi| xi < x);
            let iz = heights.partition_point(|&zi| zi < z);
            values[iz * nx + ix] = v;
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(SweepError::Config("field grid contains duplicate or missing samples".into()));
        }

        Ok(Self { xs, heights, values })
    }

    pub fn xs(&self) -> &[f64] {
        &self.xs
    }

    pub fn heights(&self) -> &[f64] {
        &self.heights
    }
}

/// Lower bracket index and fractional offset of `v` on a sorted axis, clamped.
fn bracket(axis: &[f64], v: f64) -> (usize, f64) {
    if axis.len() == 1 {
        return (0, 0.0);
    }
    let i = axis.partition_point(|&a| a <= v).saturating_sub(1).min(axis.len() - 2);
    let t = ((v - axis[i]) / (axis[i + 1] - axis[i])).clamp(0.0, 1.0);
    (i, t)
}

impl FieldSampler for SampledField {
    fn potential(&self, x: f64, height: f64) -> f64 {
        let nx = self.xs.len();
        let (ix, tx) = bracket(&self.xs, x);
        let (iz, tz) = bracket(&self.heights, height);
        let iz1 = (iz + 1).min(self.heights.len() - 1);

        let v00 = self.values[iz * nx + ix];
        let v01 = self.values[iz * nx + ix + 1];
        let v10 = self.values[iz1 * nx + ix];
        let v11 = self.values[iz1 * nx + ix + 1];

        (1.0 - tz) * ((1.0 - tx) * v00 + tx * v01) + tz * ((1.0 - tx) * v10 + tx * v11)
    }
}
