//! End-to-end sweep scenarios in reduced units (k = 1, U = x² + y²).

use approx::assert_relative_eq;
use std::path::Path;

use crate::error::SweepError;
use crate::field::HarmonicField;
use crate::io::{
    AnnealConfig, FieldConfig, GeometryConfig, OutputConfig, SolverConfig, StoreReader, SweepConfig, VoltageSweep,
};
use crate::monitor::{count_frames, Rect};
use crate::potential::PotentialModel;
use crate::sweep::{figures_dir, run_sweep, run_sweep_with_field, trace_path, FieldSummary};

/// 2 x 2 lattice at unit spacing: a square of half-diagonal 1/√2 around the origin.
pub(crate) fn square_config(dir: &Path, voltages: Vec<f64>) -> SweepConfig {
    SweepConfig {
        geometry: GeometryConfig {
            box_length: 100.0,
            n_electrons: 4,
            n_rows: 2,
            row_spacing: 1.0,
            n_cols: 2,
            col_spacing: 1.0,
            origin: (0.0, 0.0),
            periodic_y: false,
        },
        voltages: VoltageSweep::List(voltages),
        field: FieldConfig::Harmonic { kx: 1.0, ky: 1.0 },
        solver: SolverConfig {
            coulomb_constant: 1.0,
            gradient_tolerance: 1e-6,
            ..SolverConfig::default()
        },
        anneal: AnnealConfig::default(),
        trap: Rect { x: (-1.0, 1.0), y: (-1.0, 1.0) },
        plot_window: Rect { x: (-3.0, 3.0), y: (-3.0, 3.0) },
        output: OutputConfig {
            snapshots: false,
            movie: false,
            ..OutputConfig::new(dir)
        },
    }
}

/// Ground-state energy of the square at voltage `v`: E = 12·v·ρ², ρ³ = (2√2 + 1) / (8v).
fn square_energy(v: f64) -> f64 {
    let c = 2.0 * 2.0f64.sqrt() + 1.0;
    let rho = (c / (8.0 * v)).cbrt();
    12.0 * v * rho * rho
}

pub(crate) fn harmonic_summary() -> FieldSummary {
    FieldSummary::sample(&HarmonicField { kx: 1.0, ky: 1.0 }, (-3.0, 3.0), 61)
}

#[test]
fn test_square_relaxes_to_symmetric_minimum() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("square");
    let summary = run_sweep(&square_config(&out, vec![1.0])).unwrap();

    assert_eq!(summary.records.len(), 1);
    let record = &summary.records[0];
    assert!(record.solution_converged);
    assert_eq!(record.status, 0);
    assert_relative_eq!(record.energy, square_energy(1.0), max_relative = 1e-6);

    let rho3 = (2.0 * 2.0f64.sqrt() + 1.0) / 8.0;
    for p in record.electron_final_coordinates.chunks_exact(2) {
        assert_relative_eq!(p[0].hypot(p[1]), rho3.cbrt(), max_relative = 1e-4);
    }
    assert_eq!(record.electrons_in_trap, 4);
    assert_eq!(record.unbounded_electrons, 0);
    assert!(trace_path(&out, 0).is_file());
}

#[test]
fn test_single_voltage_writes_one_record() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("single");
    let initial = vec![0.3, 0.1, -0.4, 0.2, 0.1, -0.5, -0.2, -0.3];
    let config = square_config(&out, vec![0.5]);
    let summary = run_sweep_with_field(&config, HarmonicField { kx: 1.0, ky: 1.0 }, harmonic_summary(), initial.clone())
        .unwrap();
    assert_eq!(summary.first_step, 0);

    let reader = StoreReader::open(&out).unwrap();
    assert_eq!(reader.len(), 1);
    assert!(reader.metadata().complete);
    assert_eq!(reader.metadata().voltages, vec![0.5]);

    let step = reader.step(0).unwrap();
    assert_eq!(step.electron_initial_coordinates, initial);
    assert_ne!(step.electron_final_coordinates, initial);
    assert!(step.round_energies.is_empty());
    assert_relative_eq!(step.energy, square_energy(0.5), max_relative = 1e-6);
}

#[test]
fn test_non_convergence_does_not_abort_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("stubborn");
    let mut config = square_config(&out, vec![1.0, 0.9]);
    config.solver.gradient_tolerance = 0.0;
    config.solver.ftol = 0.0;
    config.solver.max_iterations = 2;

    let summary = run_sweep(&config).unwrap();
    assert_eq!(summary.records.len(), 2);
    assert_eq!(summary.non_converged, vec![0, 1]);
    for record in &summary.records {
        assert!(!record.solution_converged);
        assert_eq!(record.status, 1);
        assert!(record.energy.is_finite());
    }
    assert_eq!(StoreReader::open(&out).unwrap().len(), 2);
}

#[test]
fn test_warm_start_tracks_a_smooth_branch() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("warm");
    let voltages: Vec<f64> = (0..11).map(|i| 1.0 - 0.02 * i as f64).collect();
    let summary = run_sweep(&square_config(&out, voltages.clone())).unwrap();
    let records = &summary.records;
    assert_eq!(records.len(), voltages.len());

    for pair in records.windows(2) {
        assert_eq!(pair[1].electron_initial_coordinates, pair[0].electron_final_coordinates);
        let jump = (pair[1].energy - pair[0].energy).abs();
        assert!(jump < 0.02 * pair[0].energy.abs(), "energy jumped by {}", jump);
    }
    for (record, v) in records.iter().zip(&voltages) {
        assert_relative_eq!(record.energy, square_energy(*v), max_relative = 1e-6);
    }
    assert_eq!(summary.final_coordinates, records[10].electron_final_coordinates);
}

#[test]
fn test_annealing_rounds_are_recorded_and_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = square_config(&dir.path().join("a"), vec![1.0]);
    config.anneal = AnnealConfig { rounds: 3, scale: 0.05, seed: 11 };
    let first = run_sweep(&config).unwrap();

    config.output.directory = dir.path().join("b");
    let second = run_sweep(&config).unwrap();

    let (a, b) = (&first.records[0], &second.records[0]);
    assert_eq!(a.round_energies.len(), 3);
    assert_eq!(a.round_energies, b.round_energies);
    assert_eq!(a.electron_final_coordinates, b.electron_final_coordinates);
    assert_relative_eq!(a.energy, square_energy(1.0), max_relative = 1e-6);
}

#[test]
fn test_resume_continues_after_last_step() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("resume");
    let voltages = vec![1.0, 0.9, 0.8];
    let mut config = square_config(&out, voltages.clone());
    let full = run_sweep(&config).unwrap();

    std::fs::remove_file(out.join("steps").join("step_0002.json")).unwrap();
    config.output.resume = true;
    let resumed = run_sweep(&config).unwrap();

    assert_eq!(resumed.first_step, 2);
    assert_eq!(resumed.records.len(), 1);
    let redo = &resumed.records[0];
    let stored_previous = StoreReader::open(&out).unwrap().step(1).unwrap();
    assert_eq!(redo.electron_initial_coordinates.len(), 8);
    for (a, b) in redo.electron_initial_coordinates.iter().zip(&stored_previous.electron_final_coordinates) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
    assert_relative_eq!(redo.energy, full.records[2].energy, max_relative = 1e-9);
    assert!(resumed.metadata.complete);
    assert_eq!(StoreReader::open(&out).unwrap().len(), 3);
}

#[test]
fn test_resume_rejects_different_voltages() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("mismatch");
    let mut config = square_config(&out, vec![1.0, 0.9]);
    run_sweep(&config).unwrap();

    config.voltages = VoltageSweep::List(vec![1.0, 0.8]);
    config.output.resume = true;
    assert!(matches!(run_sweep(&config), Err(SweepError::StoreMismatch(_))));
}

#[test]
fn test_existing_store_requires_resume() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("twice");
    let config = square_config(&out, vec![1.0]);
    run_sweep(&config).unwrap();
    assert!(matches!(run_sweep(&config), Err(SweepError::StoreMismatch(_))));
}

#[test]
fn test_geometry_overflow_is_fatal_before_any_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("overflow");
    let mut config = square_config(&out, vec![1.0]);
    config.geometry.box_length = 1.5;
    config.geometry.col_spacing = 1.0;
    config.geometry.n_cols = 2;

    assert!(matches!(run_sweep(&config), Err(SweepError::Geometry(_))));
    assert!(!out.exists());
}

#[test]
fn test_wrong_initial_length_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = square_config(&dir.path().join("short"), vec![1.0]);
    let err = run_sweep_with_field(&config, HarmonicField { kx: 1.0, ky: 1.0 }, harmonic_summary(), vec![0.0; 6])
        .unwrap_err();
    assert!(matches!(err, SweepError::Geometry(_)));
}

#[test]
fn test_open_boundaries_store_energy_of_stored_coordinates() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("open");
    let mut config = square_config(&out, vec![1.0]);
    config.geometry = GeometryConfig {
        box_length: 4.0,
        n_electrons: 3,
        n_rows: 1,
        row_spacing: 1.0,
        n_cols: 3,
        col_spacing: 1.0,
        origin: (0.0, 0.0),
        periodic_y: false,
    };
    // flat along y: the chain spreads past the box edges
    let field = HarmonicField { kx: 1.0, ky: 0.0 };
    config.field = FieldConfig::Harmonic { kx: 1.0, ky: 0.0 };
    let summary = run_sweep(&config).unwrap();

    let record = &summary.records[0];
    let model = PotentialModel::new(field, 1.0, config.solver.interaction());
    let coords = &record.electron_final_coordinates;
    assert_relative_eq!(record.energy, model.total_energy(coords), max_relative = 1e-12);
    for (g, expected) in record.jacobian.iter().zip(model.gradient(coords)) {
        assert_relative_eq!(*g, expected, epsilon = 1e-12, max_relative = 1e-9);
    }
}

#[test]
fn test_resumed_frames_continue_without_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("frames");
    let mut config = square_config(&out, vec![1.0, 0.9, 0.8]);
    run_sweep(&config).unwrap();
    std::fs::remove_file(out.join("steps").join("step_0002.json")).unwrap();

    // the first run wrote no frames, so numbering restarts at zero
    config.output.resume = true;
    config.output.snapshots = true;
    let resumed = run_sweep(&config).unwrap();

    assert_eq!(resumed.first_step, 2);
    let figures = figures_dir(&out);
    assert!(figures.join("frame_00000.png").is_file());
    assert_eq!(count_frames(&figures), 1);
}
