//! YAML configuration of a voltage sweep.
//!
//! Example:
//! ```yaml
//! geometry:
//!   box_length: 40.0e-6
//!   n_electrons: 150
//!   n_rows: 3
//!   row_spacing: 0.2e-6
//!   n_cols: 50
//!   col_spacing: 0.2e-6
//! voltages: { start: 2.0, stop: 0.04, step: -0.02 }
//! field:
//!   kind: profile
//!   path: data/resonator_potential.csv
//!   helium_height: 1.0e-6
//! solver:
//!   screening_length: 1.6e-6
//!   gradient_tolerance: 0.1
//! anneal:
//!   rounds: 5
//!   scale: 0.1e-6
//! output:
//!   directory: results
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::anneal::{AnnealSchedule, GradientMode, Lbfgs};
use crate::constants::COULOMB_CONSTANT_EV_M;
use crate::error::{Result, SweepError};
use crate::monitor::Rect;
use crate::potential::Interaction;

/// Box and initial rectangular lattice. Rows stack along x, columns run
/// along the resonator (y).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    pub box_length: f64,
    pub n_electrons: usize,
    pub n_rows: usize,
    pub row_spacing: f64,
    pub n_cols: usize,
    pub col_spacing: f64,
    #[serde(default)]
    pub origin: (f64, f64),
    /// Minimum-image pair separations along y
    #[serde(default = "default_true")]
    pub periodic_y: bool,
}

/// Bias voltages, either listed or as an arange-style range (stop excluded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VoltageSweep {
    List(Vec<f64>),
    Range { start: f64, stop: f64, step: f64 },
}

impl VoltageSweep {
    pub fn values(&self) -> Result<Vec<f64>> {
        let values = match *self {
            VoltageSweep::List(ref v) => v.clone(),
            VoltageSweep::Range { start, stop, step } => {
                if step == 0.0 || !step.is_finite() {
                    return Err(SweepError::Config("voltage step must be finite and non-zero".into()));
                }
                if (stop - start) * step < 0.0 {
                    return Err(SweepError::Config(format!(
                        "voltage step {} never reaches {} from {}",
                        step, stop, start
                    )));
                }
                // stop is excluded even when rounding lands a hair past it
                let n = ((stop - start) / step - 1e-9).ceil().max(0.0) as usize;
                (0..n).map(|i| start + i as f64 * step).collect()
            }
        };
        if values.is_empty() {
            return Err(SweepError::Config("voltage sequence is empty".into()));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SweepError::Config("voltage sequence contains non-finite values".into()));
        }
        Ok(values)
    }
}

/// Where the external potential comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldConfig {
    /// CSV cross-section with columns `x_um`, `potential` and optionally `z_um`
    Profile {
        path: PathBuf,
        #[serde(default = "default_helium_height")]
        helium_height: f64,
        /// Fit window in µm for the trap frequency diagnostic
        #[serde(default = "default_fit_domain")]
        fit_domain: (f64, f64),
    },
    /// `kx·x² + ky·y²` in eV/m² per volt
    Harmonic { kx: f64, ky: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Screening length in metres, 0 disables screening
    #[serde(default)]
    pub screening_length: f64,
    #[serde(default = "default_coulomb_constant")]
    pub coulomb_constant: f64,
    #[serde(default = "default_true")]
    pub use_gradient: bool,
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_gradient_tolerance")]
    pub gradient_tolerance: f64,
    #[serde(default = "default_ftol")]
    pub ftol: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Largest coordinate change per line search, in metres
    #[serde(default)]
    pub max_step: Option<f64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            screening_length: 0.0,
            coulomb_constant: default_coulomb_constant(),
            use_gradient: true,
            epsilon: default_epsilon(),
            gradient_tolerance: default_gradient_tolerance(),
            ftol: default_ftol(),
            max_iterations: default_max_iterations(),
            max_step: None,
        }
    }
}

impl SolverConfig {
    pub fn interaction(&self) -> Interaction {
        Interaction::default()
            .with_coulomb_constant(self.coulomb_constant)
            .with_screening(self.screening_length)
    }

    pub fn minimizer(&self) -> Lbfgs {
        let gradient = if self.use_gradient {
            GradientMode::Analytic
        } else {
            GradientMode::FiniteDifference { epsilon: self.epsilon }
        };
        Lbfgs::new()
            .with_gtol(self.gradient_tolerance)
            .with_ftol(self.ftol)
            .with_max_iterations(self.max_iterations)
            .with_max_step(self.max_step)
            .with_gradient(gradient)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnealConfig {
    #[serde(default)]
    pub rounds: usize,
    /// Standard deviation of the kick, in metres
    #[serde(default)]
    pub scale: f64,
    #[serde(default)]
    pub seed: u64,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self { rounds: 0, scale: 0.0, seed: 0 }
    }
}

impl AnnealConfig {
    pub fn schedule(&self) -> AnnealSchedule {
        AnnealSchedule { rounds: self.rounds, scale: self.scale }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// One PNG per voltage step
    #[serde(default = "default_true")]
    pub snapshots: bool,
    /// Convergence frames every n iterations, 0 disables them
    #[serde(default)]
    pub frame_interval: usize,
    #[serde(default = "default_true")]
    pub movie: bool,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    /// Per-step convergence traces as CSV
    #[serde(default = "default_true")]
    pub traces: bool,
    #[serde(default)]
    pub resume: bool,
    /// Colour range of the background energy map, eV
    #[serde(default)]
    pub color_limits: Option<(f64, f64)>,
}

impl OutputConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            snapshots: true,
            frame_interval: 0,
            movie: true,
            fps: default_fps(),
            ffmpeg: default_ffmpeg(),
            traces: true,
            resume: false,
            color_limits: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub geometry: GeometryConfig,
    pub voltages: VoltageSweep,
    pub field: FieldConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub anneal: AnnealConfig,
    /// Region above the resonator that counts as trapped
    #[serde(default = "default_trap")]
    pub trap: Rect,
    /// Plot window; also the x extent of the unbounded-electron check
    #[serde(default = "default_plot_window")]
    pub plot_window: Rect,
    pub output: OutputConfig,
}

impl SweepConfig {
    /// Sanity checks that do not need the field or the filesystem.
    pub fn validate(&self) -> Result<()> {
        let g = &self.geometry;
        if !(g.box_length > 0.0) {
            return Err(SweepError::Config("box_length must be positive".into()));
        }
        if g.n_electrons == 0 {
            return Err(SweepError::Config("n_electrons must be at least 1".into()));
        }
        if self.solver.screening_length < 0.0 {
            return Err(SweepError::Config("screening_length must not be negative".into()));
        }
        if !self.solver.use_gradient && !(self.solver.epsilon > 0.0) {
            return Err(SweepError::Config("epsilon must be positive for finite differences".into()));
        }
        if self.anneal.scale < 0.0 {
            return Err(SweepError::Config("perturbation scale must not be negative".into()));
        }
        self.voltages.values()?;
        Ok(())
    }
}

/// Read a sweep configuration from a YAML file.
pub fn read_sweep_config(filename: impl AsRef<Path>) -> Result<SweepConfig> {
    let path = filename.as_ref();
    let file = File::open(path).map_err(|e| SweepError::io(path, e))?;
    let reader = BufReader::new(file);
    let config: SweepConfig = serde_yaml::from_reader(reader)?;
    config.validate()?;
    Ok(config)
}

fn default_true() -> bool {
    true
}

fn default_helium_height() -> f64 {
    1.0e-6
}

fn default_fit_domain() -> (f64, f64) {
    (-0.75, 0.75)
}

fn default_coulomb_constant() -> f64 {
    COULOMB_CONSTANT_EV_M
}

fn default_epsilon() -> f64 {
    1e-10
}

fn default_gradient_tolerance() -> f64 {
    1e-5
}

fn default_ftol() -> f64 {
    Lbfgs::default().ftol
}

fn default_max_iterations() -> usize {
    Lbfgs::default().max_iterations
}

fn default_fps() -> u32 {
    10
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_trap() -> Rect {
    Rect { x: (-0.5e-6, 0.5e-6), y: (-20e-6, 20e-6) }
}

fn default_plot_window() -> Rect {
    Rect { x: (-1.8e-6, 1.8e-6), y: (-20e-6, 20e-6) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    const EXAMPLE: &str = r#"
geometry:
  box_length: 40.0e-6
  n_electrons: 150
  n_rows: 3
  row_spacing: 0.2e-6
  n_cols: 50
  col_spacing: 0.2e-6
voltages: { start: 2.0, stop: 0.04, step: -0.02 }
field:
  kind: profile
  path: potential.csv
solver:
  screening_length: 1.6e-6
  gradient_tolerance: 0.1
anneal:
  rounds: 5
  scale: 0.1e-6
  seed: 3
output:
  directory: results
  movie: false
"#;

    #[test]
    fn test_read_example_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        let config = read_sweep_config(file.path()).unwrap();

        assert_eq!(config.geometry.n_electrons, 150);
        assert!(config.geometry.periodic_y);
        assert_eq!(
            config.field,
            FieldConfig::Profile {
                path: PathBuf::from("potential.csv"),
                helium_height: 1.0e-6,
                fit_domain: (-0.75, 0.75),
            }
        );
        assert!(config.solver.use_gradient);
        assert_eq!(config.solver.coulomb_constant, COULOMB_CONSTANT_EV_M);
        assert_eq!(config.anneal.schedule(), AnnealSchedule { rounds: 5, scale: 0.1e-6 });
        assert!(!config.output.movie);
        assert!(config.output.snapshots);
        assert_eq!(config.output.fps, 10);
        assert_eq!(config.trap, default_trap());
    }

    #[test]
    fn test_voltage_range_follows_arange() {
        let v = VoltageSweep::Range { start: 2.0, stop: 0.04, step: -0.02 }.values().unwrap();
        assert_eq!(v.len(), 98);
        assert_relative_eq!(v[0], 2.0);
        assert_relative_eq!(v[97], 0.06, epsilon = 1e-12);
    }

    #[test]
    fn test_voltage_list_and_bad_ranges() {
        let list: VoltageSweep = serde_yaml::from_str("[1.0, 0.5]").unwrap();
        assert_eq!(list.values().unwrap(), vec![1.0, 0.5]);

        assert!(VoltageSweep::Range { start: 1.0, stop: 0.0, step: 0.0 }.values().is_err());
        assert!(VoltageSweep::Range { start: 1.0, stop: 0.0, step: 0.1 }.values().is_err());
        assert!(VoltageSweep::List(vec![]).values().is_err());
    }

    #[test]
    fn test_harmonic_field_config() {
        let field: FieldConfig = serde_yaml::from_str("kind: harmonic\nkx: 1.0\nky: 2.0\n").unwrap();
        assert_eq!(field, FieldConfig::Harmonic { kx: 1.0, ky: 2.0 });
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = read_sweep_config("/definitely/not/here.yml").unwrap_err();
        assert!(matches!(err, SweepError::Io { .. }));
    }
}
