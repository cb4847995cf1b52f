//! Multi-dimensional Monte Carlo simulation.
//!
//! * [`MultiPath`]: one realisation of a multi-dimensional process on a
//!   time grid
//! * [`MultiPathGenerator`]: draws paths from any [`StochasticProcess`],
//!   optionally with antithetic variates
//! * [`PathPricer`] / [`SequencePathPricer`]: scalar and vector payoffs
//! * [`MonteCarloSimulation`]: drives generation and collects streaming,
//!   mergeable statistics

use crate::time_grid::TimeGrid;
use rand::RngCore;
use xa_core::{errors::Result, Real, Time};
use xa_math::{
    Array, GaussianSequenceGenerator, MersenneTwisterUniformRng, SequenceStatistics, Statistics,
};
use xa_processes::StochasticProcess;

// ─── MultiPath ────────────────────────────────────────────────────────────────

/// A sample path of a multi-dimensional process: one state per grid time.
#[derive(Debug, Clone)]
pub struct MultiPath {
    times: Vec<Time>,
    states: Vec<Array>,
}

impl MultiPath {
    /// Grid times, including 0.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// State at grid point `i`.
    pub fn state(&self, i: usize) -> &Array {
        &self.states[i]
    }

    /// Component `asset` at grid point `i`.
    pub fn value(&self, asset: usize, i: usize) -> Real {
        self.states[i][asset]
    }

    /// Final state.
    pub fn back(&self) -> &Array {
        &self.states[self.states.len() - 1]
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the path has no points.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

// ─── MultiPathGenerator ───────────────────────────────────────────────────────

/// Generates sample paths of a multi-dimensional stochastic process.
///
/// Each path consumes `steps × factors` standard normals. In antithetic
/// mode every second path reuses the previous draws with flipped sign.
pub struct MultiPathGenerator<'a, P: ?Sized, R = MersenneTwisterUniformRng> {
    process: &'a P,
    grid: TimeGrid,
    normals: GaussianSequenceGenerator<R>,
    antithetic: bool,
    cached: Vec<Real>,
    next_is_mirror: bool,
}

impl<'a, P: StochasticProcess + ?Sized> MultiPathGenerator<'a, P> {
    /// Mersenne-Twister backed generator.
    pub fn new(process: &'a P, grid: TimeGrid, seed: u64, antithetic: bool) -> Self {
        Self::with_rng(process, grid, MersenneTwisterUniformRng::new(seed), antithetic)
    }
}

impl<'a, P: StochasticProcess + ?Sized, R: RngCore> MultiPathGenerator<'a, P, R> {
    /// Generator driven by an arbitrary uniform source.
    pub fn with_rng(process: &'a P, grid: TimeGrid, rng: R, antithetic: bool) -> Self {
        let dimension = grid.steps() * process.factors();
        Self {
            process,
            grid,
            normals: GaussianSequenceGenerator::with_rng(dimension, rng),
            antithetic,
            cached: Vec::new(),
            next_is_mirror: false,
        }
    }

    /// The simulation grid.
    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    /// Generate one sample path.
    pub fn next_path(&mut self) -> MultiPath {
        if self.antithetic && self.next_is_mirror {
            for v in self.cached.iter_mut() {
                *v = -*v;
            }
        } else {
            self.cached = self.normals.next_sequence();
        }
        if self.antithetic {
            self.next_is_mirror = !self.next_is_mirror;
        }

        let factors = self.process.factors();
        let times = self.grid.times().to_vec();
        let mut states = Vec::with_capacity(times.len());
        let mut x = self.process.initial_values();
        states.push(x.clone());
        for (i, chunk) in self.cached.chunks(factors.max(1)).take(self.grid.steps()).enumerate() {
            let dw = Array::from_slice(chunk);
            x = self.process.evolve(times[i], &x, self.grid.dt(i), &dw);
            states.push(x.clone());
        }
        MultiPath { times, states }
    }
}

// ─── Path pricers ─────────────────────────────────────────────────────────────

/// A scalar functional of a sample path.
pub trait PathPricer {
    /// Evaluate on one path.
    fn value(&self, path: &MultiPath) -> Real;
}

impl<F: Fn(&MultiPath) -> Real> PathPricer for F {
    fn value(&self, path: &MultiPath) -> Real {
        self(path)
    }
}

/// A vector-valued functional of a sample path.
pub trait SequencePathPricer {
    /// Number of values produced per path.
    fn dimension(&self) -> usize;

    /// Evaluate on one path.
    fn values(&self, path: &MultiPath) -> Vec<Real>;
}

// ─── MonteCarloSimulation ─────────────────────────────────────────────────────

/// Monte Carlo driver over a stochastic process and a time grid.
pub struct MonteCarloSimulation<'a, P: ?Sized> {
    process: &'a P,
    grid: TimeGrid,
    seed: u64,
    antithetic: bool,
}

impl<'a, P: StochasticProcess + ?Sized> MonteCarloSimulation<'a, P> {
    /// Create a simulation.
    pub fn new(process: &'a P, grid: TimeGrid, seed: u64) -> Self {
        Self {
            process,
            grid,
            seed,
            antithetic: false,
        }
    }

    /// Enable or disable antithetic variates.
    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }

    fn generator(&self, seed: u64) -> MultiPathGenerator<'a, P> {
        MultiPathGenerator::new(self.process, self.grid.clone(), seed, self.antithetic)
    }

    /// Run `n_paths` paths and collect the pricer's values.
    pub fn simulate(&self, pricer: &dyn PathPricer, n_paths: usize) -> Statistics {
        let mut gen = self.generator(self.seed);
        let mut stats = Statistics::new();
        for _ in 0..n_paths {
            stats.add(pricer.value(&gen.next_path()));
        }
        stats
    }

    /// Run `batches` independent batches of `batch_paths` paths, seeded
    /// `seed, seed+1, …`, and merge their statistics.
    pub fn simulate_in_batches(
        &self,
        pricer: &dyn PathPricer,
        batch_paths: usize,
        batches: usize,
    ) -> Statistics {
        let mut total = Statistics::new();
        for b in 0..batches {
            let mut gen = self.generator(self.seed.wrapping_add(b as u64));
            let mut stats = Statistics::new();
            for _ in 0..batch_paths {
                stats.add(pricer.value(&gen.next_path()));
            }
            total.merge(&stats);
        }
        total
    }

    /// Run `n_paths` paths collecting a vector of values per path.
    pub fn simulate_sequence(
        &self,
        pricer: &dyn SequencePathPricer,
        n_paths: usize,
    ) -> Result<SequenceStatistics> {
        let mut gen = self.generator(self.seed);
        let mut stats = SequenceStatistics::new(pricer.dimension());
        for _ in 0..n_paths {
            stats.add(&pricer.values(&gen.next_path()))?;
        }
        Ok(stats)
    }
}
