//! Per-`n` batch orchestration.
//!
//! Every tree count `n = 1..=max_n` is an independent task: it owns its
//! configuration, collision index and random generator (seeded with
//! [`derive_seed`]`(master_seed, n)`), so tasks run on a rayon pool without
//! sharing mutable state. Results come back sorted by `n`.
//!
//! Finished layouts are checked against their six-decimal submission form;
//! if rounding makes trees overlap, the layout is spread about its center by
//! the smallest factor `1 + 1e-6 * 2^k` that survives rounding.

use crate::submission::{self, Layouts};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::Instant;
use thiserror::Error;
use treepack_core::{derive_seed, AnnealConfig};
use treepack_d2::{refine, scoring, seed, Annealer, Configuration};

const ROUNDING_SPREAD_ATTEMPTS: i32 = 20;

/// Errors from a batch run.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("n = {n}: {source}")]
    Engine {
        n: usize,
        #[source]
        source: treepack_core::Error,
    },
}

/// Search algorithm applied to each layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Seed only.
    Seed,
    /// Strict-validity annealing.
    Strict,
    /// Soft-penalty annealing.
    Penalty,
    /// Extended multi-kernel annealing with strict acceptance.
    Extended,
    /// Extended multi-kernel annealing with penalized acceptance.
    ExtendedPenalty,
}

impl Algorithm {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Seed => "seed",
            Algorithm::Strict => "strict",
            Algorithm::Penalty => "penalty",
            Algorithm::Extended => "extended",
            Algorithm::ExtendedPenalty => "extended-penalty",
        }
    }
}

/// Initial configuration heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Seeding {
    /// Greedy radial scanning.
    #[default]
    Radial,
    /// Staggered rows.
    Lattice,
    /// Block grid of interlocked pairs tuned by a genetic algorithm.
    GridGa,
}

impl Seeding {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Seeding::Radial => "radial",
            Seeding::Lattice => "lattice",
            Seeding::GridGa => "grid-ga",
        }
    }
}

/// Configuration for batch runs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Largest tree count; layouts `1..=max_n` are solved.
    pub max_n: usize,
    /// Search algorithm.
    pub algorithm: Algorithm,
    /// Initial configuration heuristic when no starting layout is given.
    pub seeding: Seeding,
    /// Annealing parameters; the seed is replaced per task.
    pub anneal: AnnealConfig,
    /// Master seed for per-task seed derivation.
    pub master_seed: u64,
    /// Sweeps of post-annealing refinement (0 = none).
    pub refine_iters: usize,
    /// Worker threads (`None` = rayon default).
    pub threads: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_n: 200,
            algorithm: Algorithm::Strict,
            seeding: Seeding::Radial,
            anneal: AnnealConfig::default(),
            master_seed: 42,
            refine_iters: 0,
            threads: None,
        }
    }
}

impl BatchConfig {
    /// Creates a new batch configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest tree count.
    pub fn with_max_n(mut self, max_n: usize) -> Self {
        self.max_n = max_n;
        self
    }

    /// Sets the search algorithm.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Sets the seeding heuristic.
    pub fn with_seeding(mut self, seeding: Seeding) -> Self {
        self.seeding = seeding;
        self
    }

    /// Sets the annealing parameters.
    pub fn with_anneal(mut self, anneal: AnnealConfig) -> Self {
        self.anneal = anneal;
        self
    }

    /// Sets the master seed.
    pub fn with_master_seed(mut self, seed: u64) -> Self {
        self.master_seed = seed;
        self
    }

    /// Sets the refinement sweeps.
    pub fn with_refine_iters(mut self, iters: usize) -> Self {
        self.refine_iters = iters;
        self
    }

    /// Sets the worker thread count.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Result for one tree count.
#[derive(Debug, Clone)]
pub struct LayoutResult {
    /// Tree count.
    pub n: usize,
    /// Bounding-square side.
    pub side: f64,
    /// Contribution `side² / n` to the total score.
    pub score: f64,
    /// Whether the layout is collision-free.
    pub valid: bool,
    /// The layout.
    pub configuration: Configuration,
    /// Wall-clock time in milliseconds.
    pub elapsed_ms: u64,
}

impl LayoutResult {
    /// Scores a finished layout.
    pub fn evaluate(n: usize, configuration: Configuration, elapsed_ms: u64) -> Self {
        Self {
            n,
            side: scoring::bounding_square_side(&configuration),
            score: scoring::packing_score(&configuration),
            valid: !scoring::has_collision(&configuration),
            configuration,
            elapsed_ms,
        }
    }
}

/// Sum of per-layout scores.
pub fn total_score(results: &[LayoutResult]) -> f64 {
    results.iter().map(|r| r.score).sum()
}

/// Collects results into layouts keyed by `n`.
pub fn to_layouts(results: &[LayoutResult]) -> Layouts {
    results
        .iter()
        .map(|r| (r.n, r.configuration.clone()))
        .collect()
}

/// Batch runner.
pub struct BatchRunner {
    config: BatchConfig,
}

impl BatchRunner {
    /// Creates a new batch runner.
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Solves every layout `1..=max_n`, starting from `starts[n]` where given.
    pub fn run(&self, starts: &Layouts) -> Result<Vec<LayoutResult>, BatchError> {
        let start_time = Instant::now();
        log::info!(
            "{} batch: n = 1..={}, threads = {}",
            self.config.algorithm.name(),
            self.config.max_n,
            self.config
                .threads
                .map_or_else(|| "default".to_string(), |t| t.to_string())
        );

        let solve_all = || -> Result<Vec<LayoutResult>, BatchError> {
            (1..=self.config.max_n)
                .into_par_iter()
                .map(|n| self.solve_one(n, starts.get(&n)))
                .collect()
        };

        let mut results = match self.config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(solve_all)?,
            None => solve_all()?,
        };
        results.sort_by_key(|r| r.n);

        log::info!(
            "batch finished: {} layouts, total score {:.6}, {} ms",
            results.len(),
            total_score(&results),
            start_time.elapsed().as_millis()
        );
        Ok(results)
    }

    /// Solves the layout with `n` trees.
    pub fn solve_one(
        &self,
        n: usize,
        start: Option<&Configuration>,
    ) -> Result<LayoutResult, BatchError> {
        let start_time = Instant::now();
        let task_seed = derive_seed(self.config.master_seed, n as u64);
        let mut rng = StdRng::seed_from_u64(task_seed);

        let initial = match start {
            Some(cfg) if cfg.len() == n => cfg.clone(),
            Some(cfg) => {
                log::warn!(
                    "n = {}: starting layout has {} trees, seeding instead",
                    n,
                    cfg.len()
                );
                self.seed(n, &mut rng)
            }
            None => self.seed(n, &mut rng),
        };

        let anneal_config = self.config.anneal.clone().with_seed(task_seed);
        let engine = |source| BatchError::Engine { n, source };
        let result = match self.config.algorithm {
            Algorithm::Seed => None,
            Algorithm::Strict => Some(Annealer::strict(anneal_config).run(initial.clone())),
            Algorithm::Penalty => Some(Annealer::penalty(anneal_config).run(initial.clone())),
            Algorithm::Extended => {
                Some(Annealer::extended_strict(anneal_config).run(initial.clone()))
            }
            Algorithm::ExtendedPenalty => {
                Some(Annealer::extended_penalty(anneal_config).run(initial.clone()))
            }
        }
        .transpose()
        .map_err(engine)?;

        let mut best = match result {
            Some(r) if r.best_valid => r.best,
            Some(_) => {
                log::warn!("n = {}: annealing found no valid layout, keeping the start", n);
                initial
            }
            None => initial,
        };

        if self.config.refine_iters > 0 && !scoring::has_collision(&best) {
            best = refine::polish(&best, self.config.refine_iters);
        }
        let best = rounding_safe(n, best);

        let layout = LayoutResult::evaluate(n, best, start_time.elapsed().as_millis() as u64);
        log::info!(
            "{}: n = {}, side = {:.6}, score = {:.6}",
            self.config.algorithm.name(),
            n,
            layout.side,
            layout.score
        );
        Ok(layout)
    }

    fn seed(&self, n: usize, rng: &mut StdRng) -> Configuration {
        match self.config.seeding {
            Seeding::Radial => seed::radial_greedy(n, rng),
            Seeding::Lattice => seed::lattice(n),
            Seeding::GridGa => seed::grid_ga(n, rng),
        }
    }
}

/// Returns a layout that stays collision-free after six-decimal rounding.
///
/// Layouts that are already safe, or already colliding, come back unchanged.
pub fn rounding_safe(n: usize, config: Configuration) -> Configuration {
    if scoring::has_collision(&config)
        || !scoring::has_collision(&submission::rounded(&config))
    {
        return config;
    }

    let (cx, cy) = config.center();
    for k in 0..ROUNDING_SPREAD_ATTEMPTS {
        let factor = 1.0 + 1e-6 * 2f64.powi(k);
        let mut spread = config.clone();
        spread.scale_about(cx, cy, factor);
        if !scoring::has_collision(&spread)
            && !scoring::has_collision(&submission::rounded(&spread))
        {
            log::debug!("n = {}: spread by {} to survive rounding", n, factor);
            return spread;
        }
    }

    log::warn!("n = {}: layout collides after rounding to six decimals", n);
    config
}

/// Re-scores existing layouts without changing them.
pub fn score_layouts(layouts: &Layouts) -> Vec<LayoutResult> {
    layouts
        .iter()
        .map(|(&n, cfg)| LayoutResult::evaluate(n, cfg.clone(), 0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use treepack_d2::{intersects, Placement};

    fn quick_anneal() -> AnnealConfig {
        AnnealConfig::default()
            .with_temperatures(0.01, 0.0005)
            .with_steps(3, 50)
            .with_log_freq(0)
    }

    #[test]
    fn test_seed_only_batch() {
        let runner = BatchRunner::new(
            BatchConfig::new()
                .with_max_n(5)
                .with_algorithm(Algorithm::Seed)
                .with_seeding(Seeding::Lattice),
        );
        let results = runner.run(&Layouts::new()).unwrap();
        assert_eq!(results.len(), 5);
        for (k, r) in results.iter().enumerate() {
            assert_eq!(r.n, k + 1);
            assert_eq!(r.configuration.len(), r.n);
            assert!(r.valid);
            assert!((r.score - r.side * r.side / r.n as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_strict_batch_deterministic() {
        let config = BatchConfig::new()
            .with_max_n(4)
            .with_anneal(quick_anneal())
            .with_master_seed(5)
            .with_threads(2);
        let a = BatchRunner::new(config.clone()).run(&Layouts::new()).unwrap();
        let b = BatchRunner::new(config).run(&Layouts::new()).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.configuration, y.configuration);
            assert!(x.valid);
        }
    }

    #[test]
    fn test_start_with_wrong_count_is_reseeded() {
        let runner = BatchRunner::new(BatchConfig::new().with_algorithm(Algorithm::Seed));
        let wrong = Configuration::from_poses([(0.0, 0.0, 0.0)]);
        let r = runner.solve_one(3, Some(&wrong)).unwrap();
        assert_eq!(r.configuration.len(), 3);
    }

    #[test]
    fn test_start_layout_used() {
        let runner = BatchRunner::new(BatchConfig::new().with_algorithm(Algorithm::Seed));
        let start = Configuration::from_poses([(5.0, 5.0, 0.0), (7.0, 5.0, 0.0)]);
        let r = runner.solve_one(2, Some(&start)).unwrap();
        assert_eq!(r.configuration, start);
    }

    #[test]
    fn test_refined_batch_not_worse() {
        let base = BatchConfig::new()
            .with_max_n(3)
            .with_algorithm(Algorithm::Seed);
        let plain = BatchRunner::new(base.clone()).run(&Layouts::new()).unwrap();
        let refined = BatchRunner::new(base.with_refine_iters(20))
            .run(&Layouts::new())
            .unwrap();
        for (p, r) in plain.iter().zip(&refined) {
            assert!(r.valid);
            assert!(r.side <= p.side + 1e-12);
        }
    }

    #[test]
    fn test_grid_ga_seeded_batch() {
        let runner = BatchRunner::new(
            BatchConfig::new()
                .with_max_n(4)
                .with_algorithm(Algorithm::Seed)
                .with_seeding(Seeding::GridGa),
        );
        let a = runner.run(&Layouts::new()).unwrap();
        let b = runner.run(&Layouts::new()).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.configuration.len(), x.n);
            assert!(x.valid);
            assert_eq!(x.configuration, y.configuration);
        }
        assert_eq!(Seeding::GridGa.name(), "grid-ga");
    }

    /// Smallest horizontal offset at which two trees at `angle` do not touch.
    fn contact_offset(angle: f64) -> f64 {
        let (mut lo, mut hi) = (0.0, 2.0);
        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            let a = Placement::new(0, 0.0, 0.0, angle);
            let b = Placement::new(1, mid, 0.0, angle);
            if intersects(&a, &b) {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }

    #[test]
    fn test_rounding_safe_spreads_contact_pairs() {
        let mut repaired = 0;
        for angle in [30.0, 45.0, 60.0] {
            let gap = contact_offset(angle) + 1e-8;
            for k in 0..20 {
                let t = 3.0 + k as f64 * 5e-8;
                let config =
                    Configuration::from_poses([(t, 0.0, angle), (t + gap, 0.0, angle)]);
                assert!(!scoring::has_collision(&config));
                if scoring::has_collision(&submission::rounded(&config)) {
                    repaired += 1;
                }

                let safe = rounding_safe(2, config.clone());
                assert!(!scoring::has_collision(&safe));
                assert!(!scoring::has_collision(&submission::rounded(&safe)));
                assert!(safe.side() < config.side() + 1e-4);
            }
        }
        assert!(repaired > 0);
    }

    #[test]
    fn test_rounding_safe_keeps_safe_layouts() {
        let config = seed::lattice(6);
        assert_eq!(rounding_safe(6, config.clone()), config);
    }

    #[test]
    fn test_total_score_sums() {
        let layouts: Layouts = [(1, seed::lattice(1)), (2, seed::lattice(2))].into_iter().collect();
        let results = score_layouts(&layouts);
        let expected = results[0].side.powi(2) + results[1].side.powi(2) / 2.0;
        assert!((total_score(&results) - expected).abs() < 1e-12);
        assert_eq!(to_layouts(&results), layouts);
    }
}
