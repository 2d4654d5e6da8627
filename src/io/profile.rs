//! Potential cross-section input.
//!
//! The finite-element export is reduced offline to a CSV with columns
//! `x_um`, `potential` (volts per volt of resonator bias), and optionally
//! `z_um` when several heights above the electrode are included. With a
//! `z_um` column the rows are treated as a regular (x, z) grid and cut at the
//! helium height.

use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, SweepError};
use crate::field::{FieldSampler, SampledField};

#[derive(Debug, Deserialize)]
struct ProfileRow {
    x_um: f64,
    #[serde(default)]
    z_um: Option<f64>,
    potential: f64,
}

/// 1D potential cut at the helium height, x in metres.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialProfile {
    pub x: Vec<f64>,
    pub potential: Vec<f64>,
}

impl PotentialProfile {
    /// True when only the x <= 0 half was exported and must be mirrored.
    pub fn is_half(&self) -> bool {
        self.x.iter().all(|&x| x <= 0.0)
    }
}

pub fn load_profile_csv(path: &Path, helium_height: f64) -> Result<PotentialProfile> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let rows = reader
        .deserialize::<ProfileRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        return Err(SweepError::Config(format!("{} contains no samples", path.display())));
    }

    let with_height = rows.iter().filter(|r| r.z_um.is_some()).count();
    if with_height == 0 {
        let mut pairs: Vec<(f64, f64)> = rows.iter().map(|r| (r.x_um * 1e-6, r.potential)).collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
        return Ok(PotentialProfile {
            x: pairs.iter().map(|p| p.0).collect(),
            potential: pairs.iter().map(|p| p.1).collect(),
        });
    }
    if with_height != rows.len() {
        return Err(SweepError::Config(format!(
            "{}: z_um is given for {} of {} rows",
            path.display(),
            with_height,
            rows.len()
        )));
    }

    let samples: Vec<(f64, f64, f64)> = rows
        .iter()
        .map(|r| (r.x_um * 1e-6, r.z_um.unwrap_or_default() * 1e-6, r.potential))
        .collect();
    let grid = SampledField::from_samples(&samples)?;
    let x = grid.xs().to_vec();
    let potential = grid.cross_section(&x, helium_height);
    log::debug!(
        "cut {} x {} potential grid at height {:.3e} m",
        grid.xs().len(),
        grid.heights().len(),
        helium_height
    );
    Ok(PotentialProfile { x, potential })
}
