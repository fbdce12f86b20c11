//! Simulated annealing drivers.
//!
//! All drivers share one iteration loop ([`Annealer`]) over an
//! [`AnnealingContext`]. What varies is injected:
//!
//! - an [`AcceptancePolicy`] decides whether a mutated configuration is a
//!   candidate at all and what it scores ([`StrictAcceptance`],
//!   [`PenaltyAcceptance`]);
//! - a [`KernelSelector`] picks the move kernel for each iteration
//!   ([`SingleShapePerturb`], [`FullKernelSet`]).
//!
//! Each iteration applies a kernel, prices the result through the
//! [`CollisionIndex`], runs the Metropolis test and either commits (syncing the
//! index) or reverts through the move's undo record. After every block of
//! `n_steps_per_t` iterations the temperature is cooled.
//!
//! The best configuration reported is always collision-free; if no
//! collision-free configuration was ever seen the result says so through
//! [`AnnealResult::best_valid`] and carries the initial configuration.

use crate::configuration::Configuration;
use crate::kernels::{self, Move, MoveKind};
use crate::scoring::CollisionIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use treepack_core::{
    metropolis_accept, AnnealConfig, AnnealPhase, AnnealProgress, Result, Temperature,
};

/// Tracked overlap below this is treated as zero pending an exact check.
pub const CLEAN_OVERLAP: f64 = 1e-9;

/// Scored outcome of an applied move.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Score compared by the Metropolis test.
    pub score: f64,
    /// Bounding-square side after the move.
    pub side: f64,
    /// Total overlap after the move.
    pub overlap: f64,
    /// The configuration is believed collision-free after the move.
    pub clean: bool,
    /// Index over the mutated configuration, when the policy had to build one.
    pub index: Option<CollisionIndex>,
}

/// Decides which moves are candidates and how they score.
pub trait AcceptancePolicy {
    /// Policy name used in logs.
    fn name(&self) -> &'static str;

    /// Score of a configuration with the given side and total overlap.
    fn score(&self, side: f64, overlap: f64) -> f64;

    /// Prices the move just applied to `ctx.config`.
    ///
    /// Returns `None` if the move is disqualified regardless of temperature.
    /// The index in `ctx` still reflects the pre-move placements.
    fn evaluate(&self, ctx: &AnnealingContext, mv: &Move) -> Option<Candidate>;

    /// Called once before the first iteration.
    fn on_start(&self, _ctx: &AnnealingContext) {}

    /// Called after every temperature update.
    fn on_cool(&self, _ctx: &mut AnnealingContext) {}

    /// Whether a clean candidate must be re-checked exactly before it is
    /// recorded as best.
    fn needs_best_confirmation(&self) -> bool {
        true
    }
}

/// Picks the kernel for each iteration.
pub trait KernelSelector {
    /// Selector name used in logs.
    fn name(&self) -> &'static str;

    /// Chooses a kernel.
    fn select<R: Rng>(&self, rng: &mut R) -> MoveKind;
}

/// Only collision-free configurations are candidates; score is the side.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictAcceptance;

impl AcceptancePolicy for StrictAcceptance {
    fn name(&self) -> &'static str {
        "strict"
    }

    fn score(&self, side: f64, _overlap: f64) -> f64 {
        side
    }

    fn evaluate(&self, ctx: &AnnealingContext, mv: &Move) -> Option<Candidate> {
        if mv.is_global() {
            let index = CollisionIndex::new(&ctx.config);
            if index.any_collision(&ctx.config) {
                return None;
            }
            let side = index.side();
            return Some(Candidate {
                score: side,
                side,
                overlap: 0.0,
                clean: true,
                index: Some(index),
            });
        }

        let group = mv.current_group(&ctx.config);
        if ctx.index.group_collides(&ctx.config, &group) {
            return None;
        }
        // Moving one shape cannot prove the rest is clean
        let mut rebuilt = None;
        if !ctx.current_valid {
            let index = CollisionIndex::new(&ctx.config);
            if index.any_collision(&ctx.config) {
                return None;
            }
            rebuilt = Some(index);
        }
        let side = ctx.index.side_with(&group);
        Some(Candidate {
            score: side,
            side,
            overlap: 0.0,
            clean: true,
            index: rebuilt,
        })
    }

    // Every accepted state passed an exact collision check
    fn needs_best_confirmation(&self) -> bool {
        false
    }

    fn on_start(&self, ctx: &AnnealingContext) {
        if !ctx.current_valid {
            log::warn!(
                "strict annealing started from an overlapping configuration of {} shapes \
                 (overlap {:.3e}); only collision-free states will be accepted",
                ctx.config.len(),
                ctx.current_overlap
            );
        }
    }
}

/// Every move is a candidate; score is `side + penalty * overlap`.
#[derive(Debug, Clone, Copy)]
pub struct PenaltyAcceptance {
    /// Weight of the total overlap area.
    pub penalty: f64,
}

impl PenaltyAcceptance {
    pub fn new(penalty: f64) -> Self {
        Self { penalty }
    }
}

impl AcceptancePolicy for PenaltyAcceptance {
    fn name(&self) -> &'static str {
        "penalty"
    }

    fn score(&self, side: f64, overlap: f64) -> f64 {
        side + self.penalty * overlap
    }

    fn evaluate(&self, ctx: &AnnealingContext, mv: &Move) -> Option<Candidate> {
        let Some(prior) = mv.prior_group() else {
            let index = CollisionIndex::new(&ctx.config);
            let overlap = index.total_overlap(&ctx.config);
            let side = index.side();
            return Some(Candidate {
                score: self.score(side, overlap),
                side,
                overlap,
                clean: overlap < CLEAN_OVERLAP,
                index: Some(index),
            });
        };

        let group = mv.current_group(&ctx.config);
        let before = ctx.index.group_overlap(&ctx.config, prior);
        let after = ctx.index.group_overlap(&ctx.config, &group);
        let overlap = (ctx.current_overlap - before + after).max(0.0);
        let side = ctx.index.side_with(&group);
        Some(Candidate {
            score: self.score(side, overlap),
            side,
            overlap,
            clean: overlap < CLEAN_OVERLAP,
            index: None,
        })
    }

    fn on_cool(&self, ctx: &mut AnnealingContext) {
        // Incremental updates drift; resync once per temperature step
        let overlap = ctx.index.total_overlap(&ctx.config);
        if (overlap - ctx.current_overlap).abs() > 1e-9 {
            log::trace!(
                "overlap drift {:.3e} corrected at temperature step {}",
                overlap - ctx.current_overlap,
                ctx.temperature.step()
            );
        }
        ctx.current_overlap = overlap;
        ctx.current_side = ctx.index.side();
        ctx.current_score = self.score(ctx.current_side, overlap);
        ctx.current_valid = overlap < CLEAN_OVERLAP;
    }
}

/// Always the basic single-shape perturbation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleShapePerturb;

impl KernelSelector for SingleShapePerturb {
    fn name(&self) -> &'static str {
        "perturb"
    }

    fn select<R: Rng>(&self, _rng: &mut R) -> MoveKind {
        MoveKind::Perturb
    }
}

/// Uniform choice among the ten extended kernels.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullKernelSet;

impl KernelSelector for FullKernelSet {
    fn name(&self) -> &'static str {
        "extended"
    }

    fn select<R: Rng>(&self, rng: &mut R) -> MoveKind {
        MoveKind::EXTENDED[rng.gen_range(0..MoveKind::EXTENDED.len())]
    }
}

/// Acceptance flavour of the extended driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtendedMode {
    /// Collision-free moves only.
    #[default]
    Strict,
    /// Soft overlap penalty.
    Penalized,
}

/// Mutable state of one annealing run.
#[derive(Debug)]
pub struct AnnealingContext {
    /// Current configuration.
    pub config: Configuration,
    /// Spatial index synced with `config` at the last commit.
    pub index: CollisionIndex,
    /// Random generator owned by the run.
    pub rng: StdRng,
    /// Cooling state.
    pub temperature: Temperature,
    /// Bounding-square side of `config`.
    pub current_side: f64,
    /// Tracked total overlap of `config`.
    pub current_overlap: f64,
    /// Policy score of `config`.
    pub current_score: f64,
    /// `config` is believed collision-free.
    pub current_valid: bool,
    /// Best collision-free configuration (the initial one until one is found).
    pub best: Configuration,
    /// Side of `best`, or infinity if no collision-free configuration was seen.
    pub best_side: f64,
    /// Whether `best` is collision-free.
    pub best_valid: bool,
    /// Completed iterations.
    pub iteration: u64,
    /// Accepted moves.
    pub accepted: u64,
    /// Moves disqualified or rejected by the Metropolis test.
    pub rejected: u64,
    /// Iterations whose kernel had nothing to do.
    pub noops: u64,
}

impl AnnealingContext {
    /// Sets up a run from its initial configuration.
    pub fn new(initial: Configuration, params: &AnnealConfig) -> Self {
        let index = CollisionIndex::new(&initial);
        let current_overlap = index.total_overlap(&initial);
        let current_valid = !index.any_collision(&initial);
        let current_side = index.side();
        let best_side = if current_valid {
            current_side
        } else {
            f64::INFINITY
        };

        Self {
            best: initial.clone(),
            config: initial,
            index,
            rng: StdRng::seed_from_u64(params.seed),
            temperature: Temperature::new(params),
            current_side,
            current_overlap,
            current_score: current_side,
            current_valid,
            best_side,
            best_valid: current_valid,
            iteration: 0,
            accepted: 0,
            rejected: 0,
            noops: 0,
        }
    }

    /// Makes an accepted move current and syncs the index.
    pub fn commit(&mut self, mv: &Move, candidate: Candidate) {
        match candidate.index {
            Some(index) => self.index = index,
            None if mv.is_global() => self.index.rebuild(&self.config),
            None => self.index.commit(&self.config, &mv.touched()),
        }
        self.current_side = candidate.side;
        self.current_overlap = candidate.overlap;
        self.current_score = candidate.score;
        self.current_valid = candidate.clean;
        self.accepted += 1;
    }

    /// Records the current configuration as best if it is collision-free and
    /// smaller than the best so far.
    ///
    /// With `confirm`, the configuration is re-checked exactly first, since a
    /// tracked overlap may only be approximately zero.
    pub fn update_best(&mut self, confirm: bool) -> bool {
        if !self.current_valid || self.current_side >= self.best_side {
            return false;
        }
        if confirm && self.index.any_collision(&self.config) {
            self.current_valid = false;
            return false;
        }
        self.best = self.config.clone();
        self.best_side = self.current_side;
        self.best_valid = true;
        true
    }

    fn best_side_opt(&self) -> Option<f64> {
        self.best_valid.then_some(self.best_side)
    }
}

/// Per-temperature summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureRecord {
    /// Completed temperature steps.
    pub step: usize,
    /// Temperature used during the block.
    pub temperature: f64,
    /// Side at the end of the block.
    pub current_side: f64,
    /// Tracked overlap at the end of the block.
    pub current_overlap: f64,
    /// Best valid side so far.
    pub best_side: Option<f64>,
    /// Fraction of the block's iterations that were accepted.
    pub acceptance_rate: f64,
}

/// Result of an annealing run.
#[derive(Debug, Clone)]
pub struct AnnealResult {
    /// Best collision-free configuration, or the initial one if none was found.
    pub best: Configuration,
    /// Side of `best`.
    pub best_side: f64,
    /// Whether `best` is collision-free.
    pub best_valid: bool,
    /// Configuration at termination.
    pub final_config: Configuration,
    /// Side at termination.
    pub final_side: f64,
    /// Tracked overlap at termination.
    pub final_overlap: f64,
    /// Iterations performed.
    pub iterations: u64,
    /// Accepted moves.
    pub accepted: u64,
    /// Rejected moves.
    pub rejected: u64,
    /// Inapplicable kernel selections.
    pub noops: u64,
    /// Total time elapsed in milliseconds
    pub elapsed_ms: u64,
    /// Temperature at termination.
    pub final_temperature: f64,
    /// The run was stopped through its cancel handle.
    pub cancelled: bool,
    /// The run hit its time limit.
    pub timed_out: bool,
    /// One record per completed temperature step.
    pub history: Vec<TemperatureRecord>,
}

/// Annealing driver parameterized by acceptance and kernel selection.
pub struct Annealer<A, K> {
    config: AnnealConfig,
    policy: A,
    selector: K,
    cancelled: Arc<AtomicBool>,
}

impl Annealer<StrictAcceptance, SingleShapePerturb> {
    /// Strict-validity driver over single-shape perturbations.
    pub fn strict(config: AnnealConfig) -> Self {
        Self::new(config, StrictAcceptance, SingleShapePerturb)
    }
}

impl Annealer<PenaltyAcceptance, SingleShapePerturb> {
    /// Soft-penalty driver over single-shape perturbations.
    pub fn penalty(config: AnnealConfig) -> Self {
        let policy = PenaltyAcceptance::new(config.overlap_penalty);
        Self::new(config, policy, SingleShapePerturb)
    }
}

impl Annealer<StrictAcceptance, FullKernelSet> {
    /// Extended driver with strict acceptance.
    pub fn extended_strict(config: AnnealConfig) -> Self {
        Self::new(config, StrictAcceptance, FullKernelSet)
    }
}

impl Annealer<PenaltyAcceptance, FullKernelSet> {
    /// Extended driver with penalized acceptance.
    pub fn extended_penalty(config: AnnealConfig) -> Self {
        let policy = PenaltyAcceptance::new(config.overlap_penalty);
        Self::new(config, policy, FullKernelSet)
    }
}

impl<A: AcceptancePolicy, K: KernelSelector> Annealer<A, K> {
    /// Creates a driver.
    pub fn new(config: AnnealConfig, policy: A, selector: K) -> Self {
        Self {
            config,
            policy,
            selector,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AnnealConfig {
        &self.config
    }

    /// Returns a handle that stops the run when set.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Runs to completion.
    pub fn run(&self, initial: Configuration) -> Result<AnnealResult> {
        self.run_with_progress(initial, |_| {})
    }

    /// Runs to completion, reporting after every temperature step.
    pub fn run_with_progress<F>(
        &self,
        initial: Configuration,
        mut progress: F,
    ) -> Result<AnnealResult>
    where
        F: FnMut(&AnnealProgress),
    {
        self.config.validate()?;
        initial.validate()?;

        let params = &self.config;
        let start_time = Instant::now();
        let time_limit = params.time_limit();
        let total = params.total_iterations();
        let block = params.n_steps_per_t as u64;

        let mut ctx = AnnealingContext::new(initial, params);
        ctx.current_score = self.policy.score(ctx.current_side, ctx.current_overlap);
        self.policy.on_start(&ctx);
        let confirm_best = self.policy.needs_best_confirmation();

        log::debug!(
            "{}/{} annealing: n={}, iterations={}, side={:.6}, overlap={:.3e}",
            self.policy.name(),
            self.selector.name(),
            ctx.config.len(),
            total,
            ctx.current_side,
            ctx.current_overlap
        );

        progress(&self.progress(&ctx, total, start_time, AnnealPhase::Running));

        let mut history = Vec::with_capacity(params.n_steps);
        let mut block_accepted = 0u64;
        let mut cancelled = false;
        let mut timed_out = false;

        while ctx.iteration < total {
            if self.cancelled.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if time_limit.is_some_and(|limit| start_time.elapsed() >= limit) {
                timed_out = true;
                break;
            }

            let temperature = ctx.temperature.current();
            let kind = self.selector.select(&mut ctx.rng);
            let sc = ctx.temperature.scale();

            match kernels::apply(kind, &mut ctx.config, params, sc, &mut ctx.rng) {
                None => ctx.noops += 1,
                Some(mv) => match self.policy.evaluate(&ctx, &mv) {
                    None => {
                        mv.revert(&mut ctx.config);
                        ctx.rejected += 1;
                    }
                    Some(candidate) => {
                        let delta = candidate.score - ctx.current_score;
                        if metropolis_accept(delta, temperature, &mut ctx.rng) {
                            ctx.commit(&mv, candidate);
                            ctx.update_best(confirm_best);
                            block_accepted += 1;
                        } else {
                            mv.revert(&mut ctx.config);
                            ctx.rejected += 1;
                        }
                    }
                },
            }

            ctx.iteration += 1;

            if params.log_freq > 0 && ctx.iteration % params.log_freq as u64 == 0 {
                log::debug!(
                    "iteration {}/{}: T={:.3e}, side={:.6}, overlap={:.3e}, best={:?}",
                    ctx.iteration,
                    total,
                    temperature,
                    ctx.current_side,
                    ctx.current_overlap,
                    ctx.best_side_opt()
                );
            }

            if ctx.iteration % block == 0 {
                let used = ctx.temperature.current();
                let next = ctx.temperature.cool();
                self.policy.on_cool(&mut ctx);
                ctx.update_best(confirm_best);

                history.push(TemperatureRecord {
                    step: ctx.temperature.step(),
                    temperature: used,
                    current_side: ctx.current_side,
                    current_overlap: ctx.current_overlap,
                    best_side: ctx.best_side_opt(),
                    acceptance_rate: block_accepted as f64 / block as f64,
                });
                block_accepted = 0;

                log::debug!(
                    "temperature step {}/{}: T {:.3e} -> {:.3e}, best={:?}",
                    ctx.temperature.step(),
                    params.n_steps,
                    used,
                    next,
                    ctx.best_side_opt()
                );

                progress(&self.progress(&ctx, total, start_time, AnnealPhase::Cooling));
            }
        }

        progress(&self.progress(&ctx, total, start_time, AnnealPhase::Terminated));

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        if ctx.best_valid {
            log::info!(
                "{}/{} annealing finished: n={}, best side {:.6}, \
                 {} iterations ({} accepted) in {} ms",
                self.policy.name(),
                self.selector.name(),
                ctx.config.len(),
                ctx.best_side,
                ctx.iteration,
                ctx.accepted,
                elapsed_ms
            );
        } else {
            log::warn!(
                "{}/{} annealing found no collision-free configuration for n={}",
                self.policy.name(),
                self.selector.name(),
                ctx.config.len()
            );
        }

        let best_side = if ctx.best_valid {
            ctx.best_side
        } else {
            ctx.best.side()
        };

        Ok(AnnealResult {
            best_side,
            best_valid: ctx.best_valid,
            final_side: ctx.current_side,
            final_overlap: ctx.current_overlap,
            iterations: ctx.iteration,
            accepted: ctx.accepted,
            rejected: ctx.rejected,
            noops: ctx.noops,
            elapsed_ms,
            final_temperature: ctx.temperature.current(),
            cancelled,
            timed_out,
            history,
            best: ctx.best,
            final_config: ctx.config,
        })
    }

    fn progress(
        &self,
        ctx: &AnnealingContext,
        total: u64,
        start_time: Instant,
        phase: AnnealPhase,
    ) -> AnnealProgress {
        AnnealProgress {
            iteration: ctx.iteration,
            total_iterations: total,
            temperature_step: ctx.temperature.step(),
            temperature: ctx.temperature.current(),
            current_score: ctx.current_score,
            current_side: ctx.current_side,
            current_overlap: ctx.current_overlap,
            best_side: ctx.best_side_opt(),
            accepted: ctx.accepted,
            rejected: ctx.rejected,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
            phase,
        }
    }
}

/// Strict-validity annealing; returns `(best side, best configuration)`.
pub fn solve_strict(
    initial: &Configuration,
    config: &AnnealConfig,
) -> Result<(f64, Configuration)> {
    let result = Annealer::strict(config.clone()).run(initial.clone())?;
    Ok((result.best_side, result.best))
}

/// Soft-penalty annealing; returns `(best side, best configuration)`.
pub fn solve_penalty(
    initial: &Configuration,
    config: &AnnealConfig,
) -> Result<(f64, Configuration)> {
    let result = Annealer::penalty(config.clone()).run(initial.clone())?;
    Ok((result.best_side, result.best))
}

/// Extended multi-kernel annealing; returns `(best side, best configuration)`.
pub fn solve_extended(
    initial: &Configuration,
    config: &AnnealConfig,
    mode: ExtendedMode,
) -> Result<(f64, Configuration)> {
    let result = match mode {
        ExtendedMode::Strict => Annealer::extended_strict(config.clone()).run(initial.clone())?,
        ExtendedMode::Penalized => {
            Annealer::extended_penalty(config.clone()).run(initial.clone())?
        }
    };
    Ok((result.best_side, result.best))
}
