//! Directory-backed result store of a voltage sweep.
//!
//! ```text
//! <dir>/metadata.json
//! <dir>/steps/step_0000.json
//! <dir>/steps/step_0001.json
//! ...
//! ```
//!
//! Every file is written to a temporary sibling, synced and renamed into
//! place, so a crash leaves either the previous state or the complete new
//! file. Steps are append-only and numbered without gaps; a reader iterates
//! them one file at a time.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SweepError};
use crate::field::TrapFrequency;

const METADATA_FILE: &str = "metadata.json";
const STEPS_DIR: &str = "steps";

/// Sweep-level data, written once when the store is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepMetadata {
    /// External energy per volt along the profile, eV/V
    pub electrostatic_potential: Vec<f64>,
    /// x positions of the profile, metres
    pub xpoints: Vec<f64>,
    /// y positions of the plotted box, metres
    pub ypoints: Vec<f64>,
    #[serde(rename = "Vres")]
    pub voltages: Vec<f64>,
    pub use_gradient: bool,
    pub gradient_tolerance: f64,
    pub n_electrons: usize,
    #[serde(default)]
    pub trap_frequency: Option<TrapFrequency>,
    /// Number of steps present when the store was last finalized
    #[serde(default)]
    pub completed_steps: usize,
    #[serde(default)]
    pub complete: bool,
}

/// Result of one voltage step. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub voltage: f64,
    pub electron_final_coordinates: Vec<f64>,
    pub electron_initial_coordinates: Vec<f64>,
    pub solution_converged: bool,
    pub energy: f64,
    pub jacobian: Vec<f64>,
    pub electrons_in_trap: usize,
    /// Minimizer status code of the final minimization
    pub status: i32,
    pub iterations: usize,
    pub unbounded_electrons: usize,
    pub density_by_area: f64,
    #[serde(default)]
    pub round_energies: Vec<f64>,
}

fn step_path(dir: &Path, step: usize) -> PathBuf {
    dir.join(STEPS_DIR).join(format!("step_{:04}.json", step))
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).map_err(|e| SweepError::io(&tmp, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush().map_err(|e| SweepError::io(&tmp, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| SweepError::io(&tmp, e))?;
    }
    fs::rename(&tmp, path).map_err(|e| SweepError::io(path, e))?;
    // the rename itself is only durable once the directory entry is synced
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        File::open(parent)
            .and_then(|d| d.sync_all())
            .map_err(|e| SweepError::io(parent, e))?;
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(|e| SweepError::io(path, e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Number of consecutive step files starting at `step_0000`.
fn count_steps(dir: &Path) -> usize {
    (0..).take_while(|&k| step_path(dir, k).is_file()).count()
}

/// Writable store, opened once per sweep.
///
/// Call [`ResultStore::finalize`] when the sweep ends, successfully or not.
pub struct ResultStore {
    dir: PathBuf,
    metadata: SweepMetadata,
    next_step: usize,
    finalized: bool,
}

impl ResultStore {
    /// Create a new store. Fails if `dir` already holds one.
    pub fn create(dir: impl Into<PathBuf>, metadata: SweepMetadata) -> Result<Self> {
        let dir = dir.into();
        if dir.join(METADATA_FILE).exists() {
            return Err(SweepError::StoreMismatch(format!(
                "{} already contains a result store; enable resume or pick another directory",
                dir.display()
            )));
        }
        let steps = dir.join(STEPS_DIR);
        fs::create_dir_all(&steps).map_err(|e| SweepError::io(&steps, e))?;

        let metadata = SweepMetadata { completed_steps: 0, complete: false, ..metadata };
        write_json_atomic(&dir.join(METADATA_FILE), &metadata)?;
        log::info!("created result store in {}", dir.display());
        Ok(Self { dir, metadata, next_step: 0, finalized: false })
    }

    /// Reopen an existing store for appending after its last complete step.
    pub fn open_existing(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let metadata: SweepMetadata = read_json(&dir.join(METADATA_FILE))?;
        let next_step = count_steps(&dir);
        log::info!("reopened result store in {} with {} steps", dir.display(), next_step);
        Ok(Self { dir, metadata, next_step, finalized: false })
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join(METADATA_FILE).is_file()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata(&self) -> &SweepMetadata {
        &self.metadata
    }

    /// Steps already on disk.
    pub fn completed_steps(&self) -> usize {
        self.next_step
    }

    /// The most recently written step, if any.
    pub fn last_step(&self) -> Result<Option<StepRecord>> {
        match self.next_step {
            0 => Ok(None),
            n => read_json(&step_path(&self.dir, n - 1)).map(Some),
        }
    }

    /// Durably write the next step.
    pub fn append_step(&mut self, record: &StepRecord) -> Result<PathBuf> {
        if record.step != self.next_step {
            return Err(SweepError::StoreMismatch(format!(
                "expected step {}, got step {}",
                self.next_step, record.step
            )));
        }
        let path = step_path(&self.dir, record.step);
        write_json_atomic(&path, record)?;
        self.next_step += 1;
        Ok(path)
    }

    /// Record how many steps were completed and close the store.
    pub fn finalize(mut self) -> Result<SweepMetadata> {
        self.finalized = true;
        self.metadata.completed_steps = self.next_step;
        self.metadata.complete = self.next_step == self.metadata.voltages.len();
        write_json_atomic(&self.dir.join(METADATA_FILE), &self.metadata)?;
        Ok(self.metadata.clone())
    }
}

impl Drop for ResultStore {
    fn drop(&mut self) {
        if !self.finalized {
            log::warn!(
                "result store in {} dropped without finalize after {} steps",
                self.dir.display(),
                self.next_step
            );
        }
    }
}

/// Read-only view of a store.
pub struct StoreReader {
    dir: PathBuf,
    metadata: SweepMetadata,
    len: usize,
}

impl StoreReader {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let metadata = read_json(&dir.join(METADATA_FILE))?;
        let len = count_steps(&dir);
        Ok(Self { dir, metadata, len })
    }

    pub fn metadata(&self) -> &SweepMetadata {
        &self.metadata
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn step(&self, k: usize) -> Result<StepRecord> {
        read_json(&step_path(&self.dir, k))
    }

    /// Steps in order, each read from disk when the iterator reaches it.
    pub fn steps(&self) -> impl Iterator<Item = Result<StepRecord>> + '_ {
        (0..self.len).map(move |k| self.step(k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(voltages: Vec<f64>) -> SweepMetadata {
        SweepMetadata {
            electrostatic_potential: vec![-0.1, -0.5, -0.1],
            xpoints: vec![-1e-6, 0.0, 1e-6],
            ypoints: vec![-20e-6, 0.0, 20e-6],
            voltages,
            use_gradient: true,
            gradient_tolerance: 0.1,
            n_electrons: 2,
            trap_frequency: None,
            completed_steps: 0,
            complete: false,
        }
    }

    fn record(step: usize, voltage: f64) -> StepRecord {
        StepRecord {
            step,
            voltage,
            electron_final_coordinates: vec![0.0, 1e-6, 0.0, -1e-6],
            electron_initial_coordinates: vec![0.0, 2e-6, 0.0, -2e-6],
            solution_converged: step % 2 == 0,
            energy: -0.25 * voltage,
            jacobian: vec![0.0; 4],
            electrons_in_trap: 2,
            status: 0,
            iterations: 12,
            unbounded_electrons: 0,
            density_by_area: 5e10,
            round_energies: vec![-0.2, -0.25],
        }
    }

    #[test]
    fn test_steps_are_readable_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::create(dir.path(), metadata(vec![2.0, 1.0, 0.5])).unwrap();
        for (k, v) in [2.0, 1.0, 0.5].iter().enumerate() {
            store.append_step(&record(k, *v)).unwrap();
        }
        let meta = store.finalize().unwrap();
        assert!(meta.complete);
        assert_eq!(meta.completed_steps, 3);

        let reader = StoreReader::open(dir.path()).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.metadata().voltages, vec![2.0, 1.0, 0.5]);
        let steps: Vec<StepRecord> = reader.steps().map(|s| s.unwrap()).collect();
        assert_eq!(steps[1], record(1, 1.0));
        assert!(!steps[1].solution_converged);
        assert!(!step_path(dir.path(), 0).with_extension("json.tmp").exists());
    }

    #[test]
    fn test_atomic_write_replaces_target_and_syncs_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");
        write_json_atomic(&path, &vec![1.0, 2.0]).unwrap();
        write_json_atomic(&path, &vec![3.0]).unwrap();

        let value: Vec<f64> = read_json(&path).unwrap();
        assert_eq!(value, vec![3.0]);
        assert!(!path.with_extension("json.tmp").exists());
        let entries = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_atomic_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("value.json");
        assert!(matches!(write_json_atomic(&path, &1.0), Err(SweepError::Io { .. })));
    }

    #[test]
    fn test_metadata_uses_dataset_names() {
        let dir = tempfile::tempdir().unwrap();
        ResultStore::create(dir.path(), metadata(vec![1.0])).unwrap().finalize().unwrap();
        let raw = fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert!(value.get("Vres").is_some());
        assert!(value.get("electrostatic_potential").is_some());
        assert_eq!(value["complete"], serde_json::Value::Bool(false));
    }

    #[test]
    fn test_out_of_order_step_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::create(dir.path(), metadata(vec![1.0, 0.5])).unwrap();
        let err = store.append_step(&record(1, 0.5)).unwrap_err();
        assert!(matches!(err, SweepError::StoreMismatch(_)));
        store.finalize().unwrap();
    }

    #[test]
    fn test_create_refuses_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        ResultStore::create(dir.path(), metadata(vec![1.0])).unwrap().finalize().unwrap();
        assert!(ResultStore::create(dir.path(), metadata(vec![1.0])).is_err());
    }

    #[test]
    fn test_reopen_continues_after_last_step() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::create(dir.path(), metadata(vec![2.0, 1.0, 0.5])).unwrap();
        store.append_step(&record(0, 2.0)).unwrap();
        store.append_step(&record(1, 1.0)).unwrap();
        drop(store);

        // A stray temporary file from an interrupted write does not count.
        fs::write(step_path(dir.path(), 2).with_extension("json.tmp"), b"{").unwrap();

        let mut store = ResultStore::open_existing(dir.path()).unwrap();
        assert_eq!(store.completed_steps(), 2);
        assert_eq!(store.last_step().unwrap().unwrap().voltage, 1.0);
        store.append_step(&record(2, 0.5)).unwrap();
        let meta = store.finalize().unwrap();
        assert!(meta.complete);
        assert_eq!(StoreReader::open(dir.path()).unwrap().len(), 3);
    }
}
