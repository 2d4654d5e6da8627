//! Building the external field a sweep runs in.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::field::{electron_frequency, fit_even_poly, ExternalField, HarmonicField, MirroredProfile, TrapFrequency};
use crate::io::{load_profile_csv, FieldConfig};

/// Number of even coefficients in the trap-frequency fit (a0, a1, a2).
const FIT_COEFFS: usize = 3;

/// External field selected by the configuration.
#[derive(Debug, Clone)]
pub enum TrapField {
    Profile(MirroredProfile),
    Harmonic(HarmonicField),
}

impl ExternalField for TrapField {
    fn value(&self, x: f64, y: f64) -> f64 {
        match self {
            TrapField::Profile(p) => p.value(x, y),
            TrapField::Harmonic(h) => h.value(x, y),
        }
    }

    fn gradient(&self, x: f64, y: f64) -> [f64; 2] {
        match self {
            TrapField::Profile(p) => p.gradient(x, y),
            TrapField::Harmonic(h) => h.gradient(x, y),
        }
    }
}

/// What the result store records about the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSummary {
    pub xpoints: Vec<f64>,
    /// Energy per volt at `xpoints`, y = 0
    pub potential: Vec<f64>,
    pub trap_frequency: Option<TrapFrequency>,
}

impl FieldSummary {
    /// Sample any field along y = 0 on `n` evenly spaced points.
    pub fn sample<F: ExternalField>(field: &F, xdomain: (f64, f64), n: usize) -> Self {
        let xpoints = linspace(xdomain.0, xdomain.1, n);
        let potential = xpoints.iter().map(|&x| field.value(x, 0.0)).collect();
        Self { xpoints, potential, trap_frequency: None }
    }
}

pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let dx = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * dx).collect()
        }
    }
}

/// Load or construct the configured field.
///
/// A profile is converted from electrostatic potential to electron energy
/// per volt (`-U`), mirrored if only the x <= 0 half is given, and fitted
/// near the centre for the trap-frequency diagnostic.
pub fn build_field(config: &FieldConfig, plot_xdomain: (f64, f64)) -> Result<(TrapField, FieldSummary)> {
    match config {
        FieldConfig::Profile { path, helium_height, fit_domain } => {
            let profile = load_profile_csv(path, *helium_height)?;
            let energy: Vec<f64> = profile.potential.iter().map(|u| -u).collect();
            let field = if profile.is_half() {
                MirroredProfile::from_half(&profile.x, &energy)?
            } else {
                MirroredProfile::from_symmetric(&profile.x, &energy)?
            };
            log::info!(
                "loaded potential profile from {} ({} points over [{:.3e}, {:.3e}] m)",
                path.display(),
                field.xs().len(),
                field.domain().0,
                field.domain().1
            );

            let x_um: Vec<f64> = field.xs().iter().map(|x| x * 1e6).collect();
            let trap_frequency = match fit_even_poly(&x_um, field.values(), FIT_COEFFS, *fit_domain) {
                Ok(fit) => electron_frequency(fit.coeffs[1], fit.errors[1]),
                Err(e) => {
                    log::warn!("trap frequency fit failed: {}", e);
                    None
                }
            };
            match &trap_frequency {
                Some(f) => log::info!(
                    "electron frequency at 1 V: {:.2} ± {:.2} GHz",
                    f.frequency_hz / 1e9,
                    f.error_hz / 1e9
                ),
                None => log::warn!("profile is not confining near x = 0, no trap frequency"),
            }

            let summary = FieldSummary {
                xpoints: field.xs().to_vec(),
                potential: field.values().to_vec(),
                trap_frequency,
            };
            Ok((TrapField::Profile(field), summary))
        }
        FieldConfig::Harmonic { kx, ky } => {
            let field = HarmonicField { kx: *kx, ky: *ky };
            let mut summary = FieldSummary::sample(&field, plot_xdomain, 501);
            summary.trap_frequency = electron_frequency(kx * 1e-12, 0.0);
            Ok((TrapField::Harmonic(field), summary))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::construct_symmetric_x;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(-1.0, 1.0, 5);
        assert_eq!(v, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(3.0, 1.0, 1), vec![3.0]);
    }

    #[test]
    fn test_half_profile_is_mirrored_and_fitted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "x_um,potential").unwrap();
        for x in construct_symmetric_x(-2.0, 251) {
            writeln!(file, "{},{}", x, 0.8 * (-x * x / 0.5).exp()).unwrap();
        }
        let config = FieldConfig::Profile {
            path: file.path().to_path_buf(),
            helium_height: 1e-6,
            fit_domain: (-0.75, 0.75),
        };
        let (field, summary) = build_field(&config, (-1.8e-6, 1.8e-6)).unwrap();

        assert_eq!(summary.xpoints.len(), 502);
        assert_relative_eq!(field.value(0.7e-6, 0.0), field.value(-0.7e-6, 3.0), epsilon = 1e-12);
        assert!(field.value(0.0, 0.0) < field.value(1e-6, 0.0));
        let f = summary.trap_frequency.unwrap();
        assert!(f.frequency_hz > 1e10 && f.frequency_hz < 1e12);
    }

    #[test]
    fn test_harmonic_summary_samples_plot_window() {
        let config = FieldConfig::Harmonic { kx: 1.0e12, ky: 0.0 };
        let (field, summary) = build_field(&config, (-1e-6, 1e-6)).unwrap();
        assert_eq!(summary.xpoints.len(), 501);
        assert_relative_eq!(summary.potential[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(field.value(1e-6, 5.0), 1.0, epsilon = 1e-12);
        assert!(summary.trap_frequency.is_some());
    }
}
