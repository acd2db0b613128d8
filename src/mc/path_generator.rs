//! Module `mc::path_generator`.
//!
//! Couples a process, a time grid and a Gaussian sequence source into a generator that
//! writes one trajectory per call into a reused buffer.
use crate::math::{FastRngKind, GaussianSequenceGenerator};
use crate::mc::TimeGrid;
use crate::models::{StepCoefficients, StochasticProcess};

#[derive(Debug)]
pub struct PathGenerator<'a, P: StochasticProcess + ?Sized> {
    process: &'a P,
    steps: Vec<StepCoefficients>,
    rsg: GaussianSequenceGenerator,
    path: Vec<f64>,
}

impl<'a, P: StochasticProcess + ?Sized> PathGenerator<'a, P> {
    /// Draws `factors * n_steps` normals per trajectory from a stream seeded with `seed`.
    pub fn new(process: &'a P, grid: &TimeGrid, kind: FastRngKind, seed: u64) -> Self {
        let steps = process.discretize(grid);
        Self::with_steps(process, steps, kind, seed)
    }

    /// Reuses step coefficients already computed for the grid.
    pub fn with_steps(
        process: &'a P,
        steps: Vec<StepCoefficients>,
        kind: FastRngKind,
        seed: u64,
    ) -> Self {
        let dimension = process.factors() * steps.len();
        let path = vec![process.initial_value(); steps.len() + 1];
        Self {
            process,
            steps,
            rsg: GaussianSequenceGenerator::new(kind, dimension, seed),
            path,
        }
    }

    /// Normals consumed per trajectory.
    #[inline]
    pub fn dimension(&self) -> usize {
        self.rsg.dimension()
    }

    /// Generates the next trajectory; valid until the following call.
    pub fn next_path(&mut self) -> &[f64] {
        let normals = self.rsg.next_sequence();
        self.process.evolve(&self.steps, normals, &mut self.path);
        &self.path
    }
}
