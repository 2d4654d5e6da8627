//! Limited-memory BFGS minimizer.
//!
//! Uses the stopping rules of the unbounded L-BFGS-B driver: stop
//! when the largest gradient component drops below `gtol`, or when the
//! relative energy reduction of one iteration drops below `ftol`. Running out
//! of iterations or failing the line search is reported through
//! [`MinimizerStatus`], never as an error.

use std::collections::VecDeque;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use super::traits::{IterationObserver, Objective};

/// Armijo sufficient-decrease constant.
const C1: f64 = 1e-4;

/// How the minimizer obtains gradients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GradientMode {
    Analytic,
    /// Forward differences with the given step
    FiniteDifference { epsilon: f64 },
}

/// Termination status, with the usual L-BFGS-B integer codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MinimizerStatus {
    Converged,
    MaxIterations,
    LineSearchFailed,
}

impl MinimizerStatus {
    pub fn code(&self) -> i32 {
        match self {
            MinimizerStatus::Converged => 0,
            MinimizerStatus::MaxIterations => 1,
            MinimizerStatus::LineSearchFailed => 2,
        }
    }
}

/// Outcome of one local minimization.
#[derive(Debug, Clone)]
pub struct MinimizeResult {
    pub x: Vec<f64>,
    pub energy: f64,
    pub gradient: Vec<f64>,
    pub iterations: usize,
    pub evaluations: usize,
    pub status: MinimizerStatus,
}

impl MinimizeResult {
    pub fn converged(&self) -> bool {
        self.status == MinimizerStatus::Converged
    }

    /// Largest absolute gradient component.
    pub fn gradient_max_norm(&self) -> f64 {
        self.gradient.iter().fold(0.0, |m, g| m.max(g.abs()))
    }
}

/// L-BFGS settings.
#[derive(Clone, Debug)]
pub struct Lbfgs {
    /// Number of stored correction pairs
    pub memory: usize,
    /// Stop when max |g_i| <= gtol
    pub gtol: f64,
    /// Stop when (f_k - f_k+1) / max(|f_k|, |f_k+1|, 1) <= ftol
    pub ftol: f64,
    pub max_iterations: usize,
    /// Maximum backtracking steps per line search
    pub max_linesearch: usize,
    /// Upper bound on the length of a single step
    pub max_step: Option<f64>,
    pub gradient: GradientMode,
}

impl Default for Lbfgs {
    fn default() -> Self {
        Self {
            memory: 10,
            gtol: 1e-5,
            ftol: 2.220446049250313e-9,
            max_iterations: 15000,
            max_linesearch: 40,
            max_step: None,
            gradient: GradientMode::Analytic,
        }
    }
}

impl Lbfgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gtol(mut self, gtol: f64) -> Self {
        self.gtol = gtol;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_memory(mut self, m: usize) -> Self {
        self.memory = m.max(1);
        self
    }

    pub fn with_max_step(mut self, step: Option<f64>) -> Self {
        self.max_step = step.filter(|s| *s > 0.0);
        self
    }

    pub fn with_gradient(mut self, mode: GradientMode) -> Self {
        self.gradient = mode;
        self
    }

    fn evaluate<O: Objective + ?Sized>(&self, objective: &O, x: &DVector<f64>) -> (f64, DVector<f64>) {
        match self.gradient {
            GradientMode::Analytic => {
                let (f, g) = objective.energy_and_gradient(x.as_slice());
                (f, DVector::from_vec(g))
            }
            GradientMode::FiniteDifference { epsilon } => {
                let f = objective.energy(x.as_slice());
                let g = objective.forward_difference_gradient(x.as_slice(), f, epsilon);
                (f, DVector::from_vec(g))
            }
        }
    }

    /// Two-loop recursion: returns -H·g for the stored curvature pairs.
    fn search_direction(
        g: &DVector<f64>,
        s_hist: &VecDeque<DVector<f64>>,
        y_hist: &VecDeque<DVector<f64>>,
        rho_hist: &VecDeque<f64>,
    ) -> DVector<f64> {
        let m = s_hist.len();
        let mut q = g.clone();
        let mut alpha = vec![0.0; m];
        for i in (0..m).rev() {
            alpha[i] = rho_hist[i] * s_hist[i].dot(&q);
            q.axpy(-alpha[i], &y_hist[i], 1.0);
        }
        if let (Some(s), Some(y)) = (s_hist.back(), y_hist.back()) {
            q *= s.dot(y) / y.dot(y);
        }
        for i in 0..m {
            let beta = rho_hist[i] * y_hist[i].dot(&q);
            q.axpy(alpha[i] - beta, &s_hist[i], 1.0);
        }
        -q
    }

    /// Minimize `objective` starting from `x0`.
    pub fn minimize<O: Objective + ?Sized>(
        &self,
        objective: &O,
        x0: &[f64],
        observer: &mut dyn IterationObserver,
    ) -> MinimizeResult {
        let mut x = DVector::from_column_slice(x0);
        let (mut f, mut g) = self.evaluate(objective, &x);
        let mut evaluations = 1;
        let mut iterations = 0;

        let mut s_hist: VecDeque<DVector<f64>> = VecDeque::with_capacity(self.memory);
        let mut y_hist: VecDeque<DVector<f64>> = VecDeque::with_capacity(self.memory);
        let mut rho_hist: VecDeque<f64> = VecDeque::with_capacity(self.memory);

        let finish = |x: DVector<f64>, f: f64, g: DVector<f64>, iterations, evaluations, status| MinimizeResult {
            x: x.as_slice().to_vec(),
            energy: f,
            gradient: g.as_slice().to_vec(),
            iterations,
            evaluations,
            status,
        };

        if x.is_empty() || g.amax() <= self.gtol {
            return finish(x, f, g, 0, evaluations, MinimizerStatus::Converged);
        }
        if !f.is_finite() {
            return finish(x, f, g, 0, evaluations, MinimizerStatus::LineSearchFailed);
        }

        let mut status = MinimizerStatus::MaxIterations;
        while iterations < self.max_iterations {
            let mut d = Self::search_direction(&g, &s_hist, &y_hist, &rho_hist);
            let mut slope = d.dot(&g);
            if !(slope < 0.0) {
                s_hist.clear();
                y_hist.clear();
                rho_hist.clear();
                d = -&g;
                slope = d.dot(&g);
            }

            let accepted = match self.line_search(objective, &x, f, &d, slope, s_hist.is_empty(), &mut evaluations) {
                Some(step) => Some(step),
                None if !s_hist.is_empty() => {
                    // Stale curvature information; retry once along steepest descent.
                    s_hist.clear();
                    y_hist.clear();
                    rho_hist.clear();
                    d = -&g;
                    slope = d.dot(&g);
                    self.line_search(objective, &x, f, &d, slope, true, &mut evaluations)
                }
                None => None,
            };

            let Some((x_new, f_new, g_new)) = accepted else {
                status = MinimizerStatus::LineSearchFailed;
                break;
            };

            let s = &x_new - &x;
            let y = &g_new - &g;
            let sy = s.dot(&y);
            if sy > f64::EPSILON * y.norm_squared() {
                if s_hist.len() == self.memory {
                    s_hist.pop_front();
                    y_hist.pop_front();
                    rho_hist.pop_front();
                }
                s_hist.push_back(s);
                y_hist.push_back(y);
                rho_hist.push_back(1.0 / sy);
            }

            let f_prev = f;
            x = x_new;
            f = f_new;
            g = g_new;
            iterations += 1;
            observer.on_iteration(iterations, x.as_slice(), f, g.as_slice());

            if g.amax() <= self.gtol {
                status = MinimizerStatus::Converged;
                break;
            }
            let reduction = (f_prev - f) / f_prev.abs().max(f.abs()).max(1.0);
            if reduction <= self.ftol {
                status = MinimizerStatus::Converged;
                break;
            }
        }

        finish(x, f, g, iterations, evaluations, status)
    }

    /// Backtracking line search with quadratic interpolation (Armijo condition).
    #[allow(clippy::too_many_arguments)]
    fn line_search<O: Objective + ?Sized>(
        &self,
        objective: &O,
        x: &DVector<f64>,
        f: f64,
        d: &DVector<f64>,
        slope: f64,
        first_step: bool,
        evaluations: &mut usize,
    ) -> Option<(DVector<f64>, f64, DVector<f64>)> {
        let d_norm = d.norm();
        if !(d_norm > 0.0) || !d_norm.is_finite() {
            return None;
        }
        let mut alpha: f64 = if first_step { (1.0 / d_norm).min(1.0) } else { 1.0 };
        if let Some(max_step) = self.max_step {
            alpha = alpha.min(max_step / d_norm);
        }

        for _ in 0..self.max_linesearch {
            let mut x_new = x.clone();
            x_new.axpy(alpha, d, 1.0);
            let (f_new, g_new) = self.evaluate(objective, &x_new);
            *evaluations += 1;

            if f_new.is_finite() && f_new <= f + C1 * alpha * slope {
                return Some((x_new, f_new, g_new));
            }

            let next = if f_new.is_finite() {
                let curvature = f_new - f - slope * alpha;
                -slope * alpha * alpha / (2.0 * curvature)
            } else {
                f64::NAN
            };
            alpha = if next.is_finite() {
                next.clamp(0.1 * alpha, 0.5 * alpha)
            } else {
                0.5 * alpha
            };
        }
        None
    }
}
