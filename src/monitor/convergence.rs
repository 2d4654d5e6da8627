//! Convergence monitor for a single voltage step.
//!
//! Attached to the minimizer as an [`IterationObserver`]. It records every
//! accepted iteration and can optionally render a frame every few iterations,
//! but it never touches the coordinates the minimizer works on.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::snapshot::SnapshotRenderer;
use crate::anneal::IterationObserver;
use crate::error::{Result, SweepError};
use crate::potential::YDomain;

/// Max- and 2-norms of the x and y gradient components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientNorms {
    pub x_max: f64,
    pub y_max: f64,
    pub x_l2: f64,
    pub y_l2: f64,
}

impl GradientNorms {
    pub fn from_gradient(gradient: &[f64]) -> Self {
        let mut norms = GradientNorms { x_max: 0.0, y_max: 0.0, x_l2: 0.0, y_l2: 0.0 };
        for pair in gradient.chunks_exact(2) {
            norms.x_max = norms.x_max.max(pair[0].abs());
            norms.y_max = norms.y_max.max(pair[1].abs());
            norms.x_l2 += pair[0] * pair[0];
            norms.y_l2 += pair[1] * pair[1];
        }
        norms.x_l2 = norms.x_l2.sqrt();
        norms.y_l2 = norms.y_l2.sqrt();
        norms
    }
}

/// One row of the convergence trace.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TraceSample {
    /// 0 for the first minimization, then the perturbation round
    pub round: usize,
    pub iteration: usize,
    pub energy: f64,
    pub grad_x_max: f64,
    pub grad_y_max: f64,
    pub grad_x_l2: f64,
    pub grad_y_l2: f64,
}

pub struct ConvergenceMonitor<'a> {
    samples: Vec<TraceSample>,
    gradients: Vec<Vec<f64>>,
    keep_gradients: bool,
    round: usize,
    frame_interval: usize,
    renderer: Option<&'a mut dyn SnapshotRenderer>,
    display_domain: Option<YDomain>,
}

impl<'a> Default for ConvergenceMonitor<'a> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ConvergenceMonitor<'a> {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            gradients: Vec::new(),
            keep_gradients: true,
            round: 0,
            frame_interval: 0,
            renderer: None,
            display_domain: None,
        }
    }

    /// Render a frame every `interval` iterations (0 disables frames).
    pub fn with_frames(mut self, renderer: &'a mut dyn SnapshotRenderer, interval: usize) -> Self {
        self.renderer = Some(renderer);
        self.frame_interval = interval;
        self
    }

    /// Fold y into `domain` before rendering. The trace itself is unaffected.
    pub fn with_display_domain(mut self, domain: Option<YDomain>) -> Self {
        self.display_domain = domain;
        self
    }

    /// Keep only the norms, not the full gradient vectors.
    pub fn with_keep_gradients(mut self, keep: bool) -> Self {
        self.keep_gradients = keep;
        self
    }

    pub fn samples(&self) -> &[TraceSample] {
        &self.samples
    }

    /// Full gradient of every recorded iteration (empty if not kept).
    pub fn gradients(&self) -> &[Vec<f64>] {
        &self.gradients
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&TraceSample> {
        self.samples.last()
    }

    /// Flush the trace to a CSV file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SweepError::io(parent, e))?;
        }
        let mut writer = csv::Writer::from_path(path)?;
        for sample in &self.samples {
            writer.serialize(sample)?;
        }
        writer.flush().map_err(|e| SweepError::io(path, e))?;
        Ok(())
    }
}

impl<'a> IterationObserver for ConvergenceMonitor<'a> {
    fn on_iteration(&mut self, iteration: usize, r: &[f64], energy: f64, gradient: &[f64]) {
        let norms = GradientNorms::from_gradient(gradient);
        self.samples.push(TraceSample {
            round: self.round,
            iteration,
            energy,
            grad_x_max: norms.x_max,
            grad_y_max: norms.y_max,
            grad_x_l2: norms.x_l2,
            grad_y_l2: norms.y_l2,
        });
        if self.keep_gradients {
            self.gradients.push(gradient.to_vec());
        }

        if self.frame_interval == 0 || iteration % self.frame_interval != 0 {
            return;
        }
        if let Some(renderer) = self.renderer.as_mut() {
            let shown = match &self.display_domain {
                Some(domain) => domain.map_y_into_domain(r),
                None => r.to_vec(),
            };
            if let Err(e) = renderer.save_snapshot(&shown) {
                log::warn!("could not render convergence frame at iteration {}: {}", iteration, e);
            }
        }
    }

    fn on_restart(&mut self, round: usize) {
        self.round = round;
    }
}
