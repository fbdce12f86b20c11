//! Genetic algorithm framework.
//!
//! A problem supplies the individual type ([`Individual`]: crossover and
//! mutation live on the individual) and its evaluation ([`GaProblem`]);
//! [`GaRunner`] drives tournament selection, elitism and generational
//! replacement. Fitness is maximized.
//!
//! The runner never owns a random generator: callers pass one in, so a run is
//! reproducible from its seed and independent runs can live on separate
//! threads.

use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the genetic algorithm.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GaConfig {
    /// Population size.
    pub population_size: usize,
    /// Maximum number of generations.
    pub max_generations: u32,
    /// Crossover rate (0.0 - 1.0).
    pub crossover_rate: f64,
    /// Mutation rate (0.0 - 1.0).
    pub mutation_rate: f64,
    /// Number of elite individuals carried over unchanged.
    pub elite_count: usize,
    /// Tournament size for selection.
    pub tournament_size: usize,
    /// Maximum time limit (None = unlimited).
    pub time_limit: Option<Duration>,
    /// Generations without improvement before stopping (None = never).
    pub stagnation_limit: Option<u32>,
}

impl Default for GaConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            max_generations: 50,
            crossover_rate: 0.7,
            mutation_rate: 0.3,
            elite_count: 1,
            tournament_size: 3,
            time_limit: None,
            stagnation_limit: None,
        }
    }
}

impl GaConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the population size.
    pub fn with_population_size(mut self, size: usize) -> Self {
        self.population_size = size.max(2);
        self
    }

    /// Sets the maximum generations.
    pub fn with_max_generations(mut self, gen: u32) -> Self {
        self.max_generations = gen;
        self
    }

    /// Sets the crossover rate.
    pub fn with_crossover_rate(mut self, rate: f64) -> Self {
        self.crossover_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the mutation rate.
    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Sets the elite count.
    pub fn with_elite_count(mut self, count: usize) -> Self {
        self.elite_count = count;
        self
    }

    /// Sets the time limit.
    pub fn with_time_limit(mut self, duration: Duration) -> Self {
        self.time_limit = Some(duration);
        self
    }

    /// Sets the stagnation limit.
    pub fn with_stagnation_limit(mut self, generations: u32) -> Self {
        self.stagnation_limit = Some(generations);
        self
    }
}

/// An individual of the population.
pub trait Individual: Clone {
    /// Returns the fitness (higher is better). Unevaluated individuals report
    /// negative infinity.
    fn fitness(&self) -> f64;

    /// Creates a random individual.
    fn random<R: Rng>(rng: &mut R) -> Self;

    /// Performs crossover with another individual.
    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self;

    /// Mutates this individual in place.
    fn mutate<R: Rng>(&mut self, rng: &mut R);
}

/// Problem-specific GA operations.
pub trait GaProblem {
    /// The individual type for this problem.
    type Individual: Individual;

    /// Evaluates an individual, caching its fitness on it.
    fn evaluate(&self, individual: &mut Self::Individual);

    /// Creates an initial population.
    fn initialize_population<R: Rng>(&self, size: usize, rng: &mut R) -> Vec<Self::Individual> {
        (0..size).map(|_| Self::Individual::random(rng)).collect()
    }

    /// Called after each generation.
    fn on_generation(&self, _generation: u32, _best: &Self::Individual) {}
}

/// Result of a GA run.
#[derive(Debug, Clone)]
pub struct GaResult<I> {
    /// The best individual found.
    pub best: I,
    /// Generations completed.
    pub generations: u32,
    /// Total elapsed time.
    pub elapsed: Duration,
    /// Best fitness at the start of every generation, plus the final value.
    pub history: Vec<f64>,
}

/// Genetic algorithm runner.
pub struct GaRunner<P: GaProblem> {
    config: GaConfig,
    problem: P,
    cancelled: Arc<AtomicBool>,
}

impl<P: GaProblem> GaRunner<P> {
    /// Creates a new GA runner.
    pub fn new(config: GaConfig, problem: P) -> Self {
        Self {
            config,
            problem,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &GaConfig {
        &self.config
    }

    /// Returns the problem.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// Returns a handle to cancel the algorithm.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs the genetic algorithm with the given random generator.
    pub fn run<R: Rng>(&self, rng: &mut R) -> GaResult<P::Individual> {
        let start = Instant::now();
        let size = self.config.population_size.max(2);
        let mut history = Vec::new();

        let mut population = self.problem.initialize_population(size, rng);
        for individual in population.iter_mut() {
            self.problem.evaluate(individual);
        }
        sort_by_fitness(&mut population);

        let mut best = population[0].clone();
        let mut stagnation = 0u32;
        let mut generation = 0u32;

        while generation < self.config.max_generations {
            if self.cancelled.load(Ordering::Relaxed) {
                break;
            }
            if self
                .config
                .time_limit
                .is_some_and(|limit| start.elapsed() > limit)
            {
                break;
            }

            history.push(best.fitness());

            let elite = self.config.elite_count.min(size - 1);
            let mut next: Vec<P::Individual> = population.iter().take(elite).cloned().collect();

            while next.len() < size {
                let parent1 = self.tournament_select(&population, rng);
                let parent2 = self.tournament_select(&population, rng);

                let mut child = if rng.gen::<f64>() < self.config.crossover_rate {
                    parent1.crossover(parent2, rng)
                } else {
                    parent1.clone()
                };
                if rng.gen::<f64>() < self.config.mutation_rate {
                    child.mutate(rng);
                }

                self.problem.evaluate(&mut child);
                next.push(child);
            }

            sort_by_fitness(&mut next);
            if next[0].fitness() > best.fitness() {
                best = next[0].clone();
                stagnation = 0;
            } else {
                stagnation += 1;
            }

            self.problem.on_generation(generation, &best);
            population = next;
            generation += 1;

            if self
                .config
                .stagnation_limit
                .is_some_and(|limit| stagnation >= limit)
            {
                break;
            }
        }

        history.push(best.fitness());

        GaResult {
            best,
            generations: generation,
            elapsed: start.elapsed(),
            history,
        }
    }

    fn tournament_select<'a, R: Rng>(
        &self,
        population: &'a [P::Individual],
        rng: &mut R,
    ) -> &'a P::Individual {
        let mut best_idx = rng.gen_range(0..population.len());
        for _ in 1..self.config.tournament_size {
            let idx = rng.gen_range(0..population.len());
            if population[idx].fitness() > population[best_idx].fitness() {
                best_idx = idx;
            }
        }
        &population[best_idx]
    }
}

fn sort_by_fitness<I: Individual>(population: &mut [I]) {
    population.sort_by(|a, b| b.fitness().total_cmp(&a.fitness()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Maximizes -(x - 3)^2.
    #[derive(Debug, Clone)]
    struct Scalar {
        x: f64,
        fitness: f64,
    }

    impl Individual for Scalar {
        fn fitness(&self) -> f64 {
            self.fitness
        }

        fn random<R: Rng>(rng: &mut R) -> Self {
            Self {
                x: rng.gen_range(-10.0..10.0),
                fitness: f64::NEG_INFINITY,
            }
        }

        fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
            let a: f64 = rng.gen();
            Self {
                x: self.x * a + other.x * (1.0 - a),
                fitness: f64::NEG_INFINITY,
            }
        }

        fn mutate<R: Rng>(&mut self, rng: &mut R) {
            self.x += rng.gen_range(-0.5..0.5);
            self.fitness = f64::NEG_INFINITY;
        }
    }

    struct Parabola;

    impl GaProblem for Parabola {
        type Individual = Scalar;

        fn evaluate(&self, individual: &mut Scalar) {
            individual.fitness = -(individual.x - 3.0).powi(2);
        }
    }

    #[test]
    fn test_converges_on_parabola() {
        let runner = GaRunner::new(GaConfig::default(), Parabola);
        let result = runner.run(&mut StdRng::seed_from_u64(1));
        assert!((result.best.x - 3.0).abs() < 0.25, "x = {}", result.best.x);
        assert_eq!(result.generations, 50);
        assert_eq!(result.history.len(), 51);
    }

    #[test]
    fn test_best_fitness_never_decreases() {
        let runner = GaRunner::new(GaConfig::default().with_max_generations(30), Parabola);
        let result = runner.run(&mut StdRng::seed_from_u64(2));
        for pair in result.history.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn test_deterministic_under_seed() {
        let runner = GaRunner::new(GaConfig::default(), Parabola);
        let a = runner.run(&mut StdRng::seed_from_u64(9));
        let b = runner.run(&mut StdRng::seed_from_u64(9));
        assert_eq!(a.best.x, b.best.x);
    }

    #[test]
    fn test_cancel_and_stagnation_stop_early() {
        let runner = GaRunner::new(GaConfig::default(), Parabola);
        runner.cancel_handle().store(true, Ordering::Relaxed);
        let result = runner.run(&mut StdRng::seed_from_u64(3));
        assert_eq!(result.generations, 0);
        assert_eq!(result.history.len(), 1);

        let config = GaConfig::default()
            .with_mutation_rate(0.0)
            .with_crossover_rate(0.0)
            .with_stagnation_limit(3);
        let result = GaRunner::new(config, Parabola).run(&mut StdRng::seed_from_u64(4));
        assert!(result.generations < 50);
    }

    #[test]
    fn test_builder_clamps() {
        let config = GaConfig::new()
            .with_population_size(1)
            .with_crossover_rate(1.5)
            .with_mutation_rate(-0.2);
        assert_eq!(config.population_size, 2);
        assert_eq!(config.crossover_rate, 1.0);
        assert_eq!(config.mutation_rate, 0.0);
    }
}
