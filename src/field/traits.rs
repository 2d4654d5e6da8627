//! Field traits for the electrostatic trap.
//!
//! `FieldSampler` is the seam to the finite-element side: something that can be
//! evaluated anywhere in the device cross-section. `ExternalField` is what the
//! potential model consumes: energy per volt of bias in the plane of the
//! electrons, together with its gradient.

/// Continuous scalar field over the device cross-section (x, height).
pub trait FieldSampler {
    /// Electrostatic potential per volt of bias at `(x, height)`.
    fn potential(&self, x: f64, height: f64) -> f64;

    /// 1D cut of the field at a fixed height.
    fn cross_section(&self, xs: &[f64], height: f64) -> Vec<f64> {
        xs.iter().map(|&x| self.potential(x, height)).collect()
    }
}

/// External energy landscape seen by a single electron in the plane.
pub trait ExternalField {
    /// Energy per volt of bias (eV/V) at `(x, y)`.
    fn value(&self, x: f64, y: f64) -> f64;

    /// Gradient `[∂/∂x, ∂/∂y]` of [`ExternalField::value`].
    fn gradient(&self, x: f64, y: f64) -> [f64; 2];

    /// Numerical gradient using central difference.
    fn numerical_gradient(&self, x: f64, y: f64, h: f64) -> [f64; 2] {
        [
            (self.value(x + h, y) - self.value(x - h, y)) / (2.0 * h),
            (self.value(x, y + h) - self.value(x, y - h)) / (2.0 * h),
        ]
    }
}

impl<T: ExternalField + ?Sized> ExternalField for &T {
    fn value(&self, x: f64, y: f64) -> f64 {
        (**self).value(x, y)
    }

    fn gradient(&self, x: f64, y: f64) -> [f64; 2] {
        (**self).gradient(x, y)
    }
}
