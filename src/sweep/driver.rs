//! Voltage sweep driver.
//!
//! The sweep walks the configured voltages in order. Each step builds a
//! fresh [`PotentialModel`] at its voltage, minimizes from the previous
//! step's final coordinates, refines with perturbation rounds, classifies the
//! result and appends it to the result store before moving on.
//!
//! ```text
//! Initializing -> (Solving -> Annealing -> Classifying -> Persisting) x N -> Finalizing -> Finished
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::anneal::Annealer;
use crate::error::{Result, SweepError};
use crate::field::ExternalField;
use crate::io::{ResultStore, StepRecord, SweepConfig, SweepMetadata};
use crate::monitor::{
    check_unbounded_electrons, count_frames, make_movie, ConvergenceMonitor, PngSnapshotWriter, SnapshotRenderer, TrapClassifier,
};
use crate::potential::{Interaction, PotentialModel, YDomain};

use super::initial::{get_rectangular_initial_condition, validate_geometry};
use super::setup::{build_field, linspace, FieldSummary};

const FIGURES_DIR: &str = "figures";
const TRACES_DIR: &str = "traces";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepPhase {
    Initializing,
    Solving { step: usize },
    Annealing { step: usize },
    Classifying { step: usize },
    Persisting { step: usize },
    Finalizing,
    Finished,
}

fn transition(phase: &mut SweepPhase, next: SweepPhase) {
    log::debug!("sweep phase {:?} -> {:?}", phase, next);
    *phase = next;
}

/// What a finished sweep run produced.
#[derive(Debug, Clone)]
pub struct SweepSummary {
    pub output_dir: PathBuf,
    /// First step computed by this run (non-zero after a resume)
    pub first_step: usize,
    /// Records computed by this run, in step order
    pub records: Vec<StepRecord>,
    /// Steps whose final minimization did not converge
    pub non_converged: Vec<usize>,
    pub final_coordinates: Vec<f64>,
    pub metadata: SweepMetadata,
    pub movie: Option<PathBuf>,
}

/// All state of a running sweep. Owns the result store.
pub struct SweepContext<F: ExternalField> {
    config: SweepConfig,
    field: F,
    voltages: Vec<f64>,
    interaction: Interaction,
    domain: YDomain,
    annealer: Annealer,
    classifier: TrapClassifier,
    store: Option<ResultStore>,
    snapshots: Option<PngSnapshotWriter>,
    current: Vec<f64>,
    first_step: usize,
    phase: SweepPhase,
}

impl<F: ExternalField> SweepContext<F> {
    /// Validate the configuration, then open or create the result store.
    ///
    /// With `output.resume` set and a store already present, the sweep
    /// continues after the last stored step, warm-started from its final
    /// coordinates. `initial` is only used when starting from step 0.
    pub fn new(config: SweepConfig, field: F, summary: FieldSummary, initial: Vec<f64>) -> Result<Self> {
        log::debug!("sweep phase {:?}", SweepPhase::Initializing);
        config.validate()?;
        validate_geometry(&config.geometry)?;
        let voltages = config.voltages.values()?;
        if initial.len() != 2 * config.geometry.n_electrons {
            return Err(SweepError::Geometry(format!(
                "initial condition has {} coordinates, expected {} for {} electrons",
                initial.len(),
                2 * config.geometry.n_electrons,
                config.geometry.n_electrons
            )));
        }

        let box_length = config.geometry.box_length;
        let domain = YDomain::centered(box_length);
        let metadata = SweepMetadata {
            electrostatic_potential: summary.potential,
            xpoints: summary.xpoints,
            ypoints: linspace(domain.lower, domain.upper, 11),
            voltages: voltages.clone(),
            use_gradient: config.solver.use_gradient,
            gradient_tolerance: config.solver.gradient_tolerance,
            n_electrons: config.geometry.n_electrons,
            trap_frequency: summary.trap_frequency,
            completed_steps: 0,
            complete: false,
        };

        let dir = config.output.directory.clone();
        let (store, current) = if config.output.resume && ResultStore::exists(&dir) {
            let store = ResultStore::open_existing(&dir)?;
            check_resumable(store.metadata(), &metadata)?;
            let current = match store.last_step()? {
                Some(last) => last.electron_final_coordinates,
                None => initial,
            };
            (store, current)
        } else {
            (ResultStore::create(&dir, metadata)?, initial)
        };
        let first_step = store.completed_steps();
        if first_step > 0 {
            log::info!("resuming sweep at step {} of {}", first_step, voltages.len());
        }

        let snapshots = if config.output.snapshots {
            let figures = figures_dir(&dir);
            fs::create_dir_all(&figures).map_err(|e| SweepError::io(&figures, e))?;
            let first_frame = count_frames(&figures);
            Some(
                PngSnapshotWriter::new(figures, config.plot_window, color_limits(&config, &voltages))
                    .with_first_frame(first_frame),
            )
        } else {
            None
        };

        // folding is only energy-preserving under minimum-image separations
        let mut annealer = Annealer::new(config.solver.minimizer(), config.anneal.schedule(), config.anneal.seed);
        if config.geometry.periodic_y {
            annealer = annealer.with_domain(domain);
        }

        Ok(Self {
            interaction: config.solver.interaction(),
            classifier: TrapClassifier::new(config.trap),
            config,
            field,
            voltages,
            domain,
            annealer,
            store: Some(store),
            snapshots,
            current,
            first_step,
            phase: SweepPhase::Initializing,
        })
    }

    pub fn phase(&self) -> SweepPhase {
        self.phase
    }

    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Run the remaining steps, then finalize. The store is closed even when
    /// a step fails.
    pub fn run(mut self) -> Result<SweepSummary> {
        let mut records = Vec::new();
        let outcome = self.run_steps(&mut records);
        let closed = self.finish();
        outcome?;
        let (metadata, movie) = closed?;

        let non_converged = records
            .iter()
            .filter(|r| !r.solution_converged)
            .map(|r| r.step)
            .collect();
        Ok(SweepSummary {
            output_dir: self.config.output.directory.clone(),
            first_step: self.first_step,
            records,
            non_converged,
            final_coordinates: self.current,
            metadata,
            movie,
        })
    }

    fn run_steps(&mut self, records: &mut Vec<StepRecord>) -> Result<()> {
        for step in self.first_step..self.voltages.len() {
            let record = self.run_step(step)?;
            self.current = record.electron_final_coordinates.clone();
            records.push(record);
        }
        Ok(())
    }

    fn run_step(&mut self, step: usize) -> Result<StepRecord> {
        let voltage = self.voltages[step];
        let initial = self.current.clone();
        let n_electrons = initial.len() / 2;
        let output = &self.config.output;

        let mut model = PotentialModel::new(&self.field, voltage, self.interaction);
        if self.config.geometry.periodic_y {
            model = model.with_periodic_y(self.config.geometry.box_length);
        }
        self.annealer.reseed(self.config.anneal.seed.wrapping_add(step as u64));

        let mut frames = if output.frame_interval > 0 {
            let dir = figures_dir(&output.directory).join(format!("step_{:04}", step));
            fs::create_dir_all(&dir).map_err(|e| SweepError::io(&dir, e))?;
            let mut writer = PngSnapshotWriter::new(dir, self.config.plot_window, color_limits(&self.config, &self.voltages));
            writer.set_background(&self.field, voltage);
            Some(writer)
        } else {
            None
        };
        let mut monitor = ConvergenceMonitor::new()
            .with_keep_gradients(false)
            .with_display_domain(Some(self.domain));
        if let Some(writer) = frames.as_mut() {
            monitor = monitor.with_frames(writer, output.frame_interval);
        }

        transition(&mut self.phase, SweepPhase::Solving { step });
        let first = self.annealer.minimize(&model, &initial, &mut monitor);
        if !first.converged() {
            log::warn!(
                "Step {} (Vres = {:.2} V) did not converge: {:?} after {} iterations",
                step,
                voltage,
                first.status,
                first.iterations
            );
        }

        transition(&mut self.phase, SweepPhase::Annealing { step });
        let outcome = self.annealer.refine(&model, first, &mut monitor);
        if self.annealer.schedule.rounds > 0 && !outcome.converged() {
            log::warn!(
                "Step {} (Vres = {:.2} V): last perturbation round did not converge ({:?})",
                step,
                voltage,
                outcome.result.status
            );
        }
        if output.traces {
            monitor.write_csv(&trace_path(&output.directory, step))?;
        }
        drop(monitor);

        transition(&mut self.phase, SweepPhase::Classifying { step });
        let result = outcome.result;
        let electrons_in_trap = self.classifier.get_trapped_electrons(&result.x);
        let unbounded_electrons = check_unbounded_electrons(
            &result.x,
            self.config.plot_window.x,
            (self.domain.lower, self.domain.upper),
        );
        let density_by_area = self.classifier.electron_density_by_area(&result.x);
        if unbounded_electrons > 0 {
            log::debug!("step {}: {} electrons outside the simulation box", step, unbounded_electrons);
        }

        transition(&mut self.phase, SweepPhase::Persisting { step });
        let record = StepRecord {
            step,
            voltage,
            solution_converged: result.converged(),
            status: result.status.code(),
            energy: result.energy,
            iterations: outcome.total_iterations,
            electron_final_coordinates: result.x,
            electron_initial_coordinates: initial,
            jacobian: result.gradient,
            electrons_in_trap,
            unbounded_electrons,
            density_by_area,
            round_energies: outcome.round_energies,
        };
        let store = self
            .store
            .as_mut()
            .ok_or(SweepError::StoreClosed)?;
        store.append_step(&record)?;

        if let Some(writer) = self.snapshots.as_mut() {
            writer.set_background(&self.field, voltage);
            if let Err(e) = writer.save_snapshot(&record.electron_final_coordinates) {
                log::warn!("could not save snapshot for step {}: {}", step, e);
            }
        }

        log::info!(
            "Step {} (Vres = {:.2} V): E = {:.6e} eV, {}/{} electrons in trap, {} iterations",
            step,
            voltage,
            record.energy,
            electrons_in_trap,
            n_electrons,
            record.iterations
        );
        Ok(record)
    }

    /// Assemble the movie and close the store.
    fn finish(&mut self) -> Result<(SweepMetadata, Option<PathBuf>)> {
        transition(&mut self.phase, SweepPhase::Finalizing);

        let mut movie = None;
        let frames = self.snapshots.as_ref().filter(|w| w.frames_written() > 0);
        if let Some(writer) = frames.filter(|_| self.config.output.movie) {
            let output = &self.config.output;
            let path = output
                .directory
                .join(format!("resonator_{}_electrons.mp4", self.config.geometry.n_electrons));
            match make_movie(&output.ffmpeg, writer.dir(), &path, output.fps) {
                Ok(()) => {
                    log::info!("wrote movie {}", path.display());
                    movie = Some(path);
                }
                Err(e) => log::warn!("movie was not created: {}", e),
            }
        }

        let store = self
            .store
            .take()
            .ok_or(SweepError::StoreClosed)?;
        let metadata = store.finalize()?;
        transition(&mut self.phase, SweepPhase::Finished);
        Ok((metadata, movie))
    }
}

fn color_limits(config: &SweepConfig, voltages: &[f64]) -> (f64, f64) {
    config.output.color_limits.unwrap_or_else(|| {
        let vmax = voltages.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        (-0.75 * vmax, 0.0)
    })
}

fn check_resumable(stored: &SweepMetadata, requested: &SweepMetadata) -> Result<()> {
    if stored.n_electrons != requested.n_electrons {
        return Err(SweepError::StoreMismatch(format!(
            "stored sweep has {} electrons, configuration has {}",
            stored.n_electrons, requested.n_electrons
        )));
    }
    let same_voltages = stored.voltages.len() == requested.voltages.len()
        && stored
            .voltages
            .iter()
            .zip(&requested.voltages)
            .all(|(a, b)| (a - b).abs() <= 1e-12 * a.abs().max(1.0));
    if !same_voltages {
        return Err(SweepError::StoreMismatch("stored voltage sequence differs from the configuration".into()));
    }
    Ok(())
}

/// Run a sweep with a caller-supplied field and initial condition.
pub fn run_sweep_with_field<F: ExternalField>(
    config: &SweepConfig,
    field: F,
    summary: FieldSummary,
    initial: Vec<f64>,
) -> Result<SweepSummary> {
    SweepContext::new(config.clone(), field, summary, initial)?.run()
}

/// Run the sweep described by `config`: build the field, place the electrons
/// on the rectangular lattice and walk the voltages.
pub fn run_sweep(config: &SweepConfig) -> Result<SweepSummary> {
    config.validate()?;
    let initial = get_rectangular_initial_condition(&config.geometry)?;
    let (field, summary) = build_field(&config.field, config.plot_window.x)?;
    run_sweep_with_field(config, field, summary, initial)
}

/// Directory holding the per-step PNG frames of a sweep.
pub fn figures_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(FIGURES_DIR)
}

/// Path of the convergence trace CSV of `step`.
pub fn trace_path(output_dir: &Path, step: usize) -> PathBuf {
    output_dir.join(TRACES_DIR).join(format!("step_{:04}.csv", step))
}
