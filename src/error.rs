//! Error type shared by the sweep, the store and the collaborators.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a sweep.
///
/// Minimizer non-convergence is deliberately absent: it is reported with
/// `log::warn!` and the best available result is kept.
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Invalid geometry: {0}")]
    Geometry(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Rendering failed: {0}")]
    Render(String),

    #[error("Profile fit failed: {0}")]
    Fit(String),

    #[error("Existing result store does not match this sweep: {0}")]
    StoreMismatch(String),

    #[error("Result store is already closed")]
    StoreClosed,
}

impl SweepError {
    /// Attach the offending path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SweepError::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, SweepError>;
