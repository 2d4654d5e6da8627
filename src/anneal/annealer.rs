//! Perturb-and-resolve annealing around the local minimizer.
//!
//! The energy landscape of a few hundred electrons has many near-degenerate
//! minima that differ by charge permutations and defects. After the first
//! local minimization the current solution is shaken with Gaussian noise and
//! minimized again, a fixed number of times. Every round's result is accepted
//! unconditionally, even when its energy is higher than the previous one.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use super::lbfgs::{Lbfgs, MinimizeResult};
use super::traits::{IterationObserver, Objective};
use crate::potential::YDomain;

/// Number and size of perturbation rounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnealSchedule {
    pub rounds: usize,
    /// Standard deviation of the Gaussian kick applied to every coordinate
    pub scale: f64,
}

impl Default for AnnealSchedule {
    fn default() -> Self {
        Self { rounds: 0, scale: 0.0 }
    }
}

/// Result of [`Annealer::minimize_with_annealing`].
#[derive(Debug, Clone)]
pub struct AnnealOutcome {
    /// Result of the last minimization, remapped into the domain
    pub result: MinimizeResult,
    /// Energy after the first local minimization
    pub initial_minimum: f64,
    /// Energy after each perturbation round
    pub round_energies: Vec<f64>,
    /// Total minimizer iterations over all rounds
    pub total_iterations: usize,
}

impl AnnealOutcome {
    pub fn converged(&self) -> bool {
        self.result.converged()
    }
}

pub struct Annealer {
    pub minimizer: Lbfgs,
    pub schedule: AnnealSchedule,
    domain: Option<YDomain>,
    rng: StdRng,
}

impl Annealer {
    pub fn new(minimizer: Lbfgs, schedule: AnnealSchedule, seed: u64) -> Self {
        Self {
            minimizer,
            schedule,
            domain: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Fold y back into `domain` after every minimization.
    pub fn with_domain(mut self, domain: YDomain) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Restart the perturbation sequence from `seed`.
    pub fn reseed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn domain(&self) -> Option<YDomain> {
        self.domain
    }

    /// Apply the coordinate remapping, if a domain is configured.
    pub fn remap(&self, r: &[f64]) -> Vec<f64> {
        match &self.domain {
            Some(domain) => domain.map_y_into_domain(r),
            None => r.to_vec(),
        }
    }

    /// Add an independent Gaussian kick to every coordinate.
    pub fn perturb(&mut self, r: &[f64]) -> Vec<f64> {
        if !(self.schedule.scale > 0.0) {
            return r.to_vec();
        }
        let Ok(normal) = Normal::new(0.0, self.schedule.scale) else {
            return r.to_vec();
        };
        r.iter().map(|&v| v + normal.sample(&mut self.rng)).collect()
    }

    /// One local minimization from `start`, folded into the domain.
    ///
    /// If the fold moves any coordinate, energy and gradient are evaluated
    /// again at the folded point so the result always describes `x`.
    pub fn minimize<O: Objective + ?Sized>(
        &self,
        objective: &O,
        start: &[f64],
        observer: &mut dyn IterationObserver,
    ) -> MinimizeResult {
        let mut result = self.minimizer.minimize(objective, start, observer);
        let folded = self.remap(&result.x);
        if folded != result.x {
            let (energy, gradient) = objective.energy_and_gradient(&folded);
            result.energy = energy;
            result.gradient = gradient;
            result.evaluations += 1;
            result.x = folded;
        }
        result
    }

    /// Perturbation rounds starting from an already minimized `result`.
    pub fn refine<O: Objective + ?Sized>(
        &mut self,
        objective: &O,
        mut result: MinimizeResult,
        observer: &mut dyn IterationObserver,
    ) -> AnnealOutcome {
        let initial_minimum = result.energy;
        let mut total_iterations = result.iterations;
        let mut round_energies = Vec::with_capacity(self.schedule.rounds);

        for round in 0..self.schedule.rounds {
            observer.on_restart(round + 1);
            let kicked = self.perturb(&result.x);
            let start = self.remap(&kicked);
            let previous = result.energy;
            result = self.minimize(objective, &start, observer);
            total_iterations += result.iterations;
            round_energies.push(result.energy);
            log::debug!(
                "anneal round {}/{}: E = {:.9e} (previous {:.9e}, {} iterations, {:?})",
                round + 1,
                self.schedule.rounds,
                result.energy,
                previous,
                result.iterations,
                result.status
            );
        }

        AnnealOutcome {
            result,
            initial_minimum,
            round_energies,
            total_iterations,
        }
    }

    /// Local minimization from `initial`, followed by the perturbation rounds.
    pub fn minimize_with_annealing<O: Objective + ?Sized>(
        &mut self,
        objective: &O,
        initial: &[f64],
        observer: &mut dyn IterationObserver,
    ) -> AnnealOutcome {
        let result = self.minimize(objective, initial, observer);
        self.refine(objective, result, observer)
    }
}
