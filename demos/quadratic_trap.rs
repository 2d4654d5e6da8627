//! Twenty electrons in an anisotropic harmonic trap, swept from 1 V down to 0.5 V.
//!
//! Run with `cargo run --example quadratic_trap`. Results are written to
//! `demo_output/quadratic_trap`, replacing those of a previous run.

use std::fs;
use std::path::Path;

use env_logger::Env;

use resonator_anneal::io::{AnnealConfig, FieldConfig, GeometryConfig, OutputConfig, SolverConfig, VoltageSweep};
use resonator_anneal::{run_sweep, Rect, SweepConfig, SweepError};

fn main() -> Result<(), SweepError> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let output = Path::new("demo_output/quadratic_trap");
    if output.exists() {
        fs::remove_dir_all(output).map_err(|e| SweepError::io(output, e))?;
    }

    let config = SweepConfig {
        geometry: GeometryConfig {
            box_length: 40e-6,
            n_electrons: 20,
            n_rows: 2,
            row_spacing: 0.3e-6,
            n_cols: 10,
            col_spacing: 0.5e-6,
            origin: (0.0, 0.0),
            periodic_y: false,
        },
        voltages: VoltageSweep::Range { start: 1.0, stop: 0.45, step: -0.05 },
        field: FieldConfig::Harmonic { kx: 2.0e9, ky: 2.0e7 },
        solver: SolverConfig {
            gradient_tolerance: 1e-2,
            max_step: Some(0.2e-6),
            ..SolverConfig::default()
        },
        anneal: AnnealConfig { rounds: 3, scale: 0.05e-6, seed: 1 },
        trap: Rect { x: (-0.5e-6, 0.5e-6), y: (-5e-6, 5e-6) },
        plot_window: Rect { x: (-2e-6, 2e-6), y: (-8e-6, 8e-6) },
        output: OutputConfig {
            movie: false,
            ..OutputConfig::new(output)
        },
    };

    let summary = run_sweep(&config)?;
    for record in &summary.records {
        println!(
            "V = {:.2} V  E = {:.6e} eV  trapped = {:2}  converged = {}",
            record.voltage, record.energy, record.electrons_in_trap, record.solution_converged
        );
    }
    Ok(())
}
