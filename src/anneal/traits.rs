//! Traits tying the energy model, the minimizer and its observers together.

/// A scalar objective over an interleaved coordinate vector.
pub trait Objective {
    /// Objective value at `r`.
    fn energy(&self, r: &[f64]) -> f64;

    /// Analytic gradient at `r`, same length as `r`.
    fn gradient(&self, r: &[f64]) -> Vec<f64>;

    /// Value and gradient together; override when they share work.
    fn energy_and_gradient(&self, r: &[f64]) -> (f64, Vec<f64>) {
        (self.energy(r), self.gradient(r))
    }

    /// Numerical gradient using central difference.
    fn numerical_gradient(&self, r: &[f64], h: f64) -> Vec<f64> {
        let mut grad = vec![0.0; r.len()];
        let mut probe = r.to_vec();
        for i in 0..r.len() {
            probe[i] = r[i] + h;
            let fwd = self.energy(&probe);
            probe[i] = r[i] - h;
            let bwd = self.energy(&probe);
            probe[i] = r[i];
            grad[i] = (fwd - bwd) / (2.0 * h);
        }
        grad
    }

    /// Forward-difference gradient with step `epsilon`, given `f0 = energy(r)`.
    fn forward_difference_gradient(&self, r: &[f64], f0: f64, epsilon: f64) -> Vec<f64> {
        let mut grad = vec![0.0; r.len()];
        let mut probe = r.to_vec();
        for i in 0..r.len() {
            probe[i] = r[i] + epsilon;
            grad[i] = (self.energy(&probe) - f0) / epsilon;
            probe[i] = r[i];
        }
        grad
    }
}

/// Read-only hook invoked after every accepted minimizer iteration.
pub trait IterationObserver {
    fn on_iteration(&mut self, iteration: usize, r: &[f64], energy: f64, gradient: &[f64]);

    /// Called before the minimizer restarts from a perturbed configuration.
    fn on_restart(&mut self, _round: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl IterationObserver for NullObserver {
    fn on_iteration(&mut self, _iteration: usize, _r: &[f64], _energy: f64, _gradient: &[f64]) {}
}
