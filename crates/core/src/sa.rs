//! Simulated annealing building blocks.
//!
//! This module holds the shape-independent half of the annealing drivers:
//! configuration, cooling schedules, the Metropolis acceptance rule, run phases
//! and progress records. The drivers themselves live next to the geometry in
//! `treepack-d2`.
//!
//! # Cooling schedules
//!
//! | Schedule | Temperature after `k` of `N` steps |
//! |----------|------------------------------------|
//! | `Linear` | `T_max - (T_max - T_min) * k / N` |
//! | `Exponential` | `T_max * exp(-ln(T_max / T_min) * k / N)` |
//! | `Polynomial(p)` | `T_min + (T_max - T_min) * ((N - k) / N)^p` |
//!
//! All three are non-increasing in `k` and equal `T_min` at `k = N`.

use crate::error::{Error, Result};
use rand::Rng;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cooling schedule kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CoolingSchedule {
    /// Constant decrement per temperature step.
    Linear,
    /// Geometric interpolation between `T_max` and `T_min`.
    #[default]
    Exponential,
    /// Polynomial decay of the given degree.
    Polynomial {
        /// Exponent applied to the remaining fraction of the schedule.
        degree: f64,
    },
}

impl CoolingSchedule {
    /// Temperature after `step` completed temperature steps out of `n_steps`.
    ///
    /// `step` is clamped to `n_steps`, so the schedule never undershoots `t_min`.
    pub fn temperature(&self, step: usize, n_steps: usize, t_max: f64, t_min: f64) -> f64 {
        if n_steps == 0 {
            return t_min;
        }
        let step = step.min(n_steps);
        let progress = step as f64 / n_steps as f64;

        match *self {
            CoolingSchedule::Linear => t_max - (t_max - t_min) * progress,
            CoolingSchedule::Exponential => {
                if step == n_steps {
                    t_min
                } else {
                    t_max * (-(t_max / t_min).ln() * progress).exp()
                }
            }
            CoolingSchedule::Polynomial { degree } => {
                let remaining = (n_steps - step) as f64 / n_steps as f64;
                t_min + (t_max - t_min) * remaining.powf(degree)
            }
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            CoolingSchedule::Linear => "linear",
            CoolingSchedule::Exponential => "exponential",
            CoolingSchedule::Polynomial { .. } => "polynomial",
        }
    }
}

/// Magnitudes used by the move kernels.
///
/// Scaled magnitudes are multiplied by `sc = clamp(T / T_max, 0, 1)` at the
/// time of the move; `jitter_step` and the Levy parameters are not.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct MoveParams {
    /// Standard deviation of the Gaussian translation kernel.
    pub translate_sigma: f64,
    /// Maximum step toward the bounding-box center.
    pub center_step: f64,
    /// Standard deviation of the Gaussian rotation kernel, in degrees.
    pub rotate_sigma_deg: f64,
    /// Maximum translation of the combined translate+rotate kernel.
    pub combined_step: f64,
    /// Maximum rotation of the combined translate+rotate kernel, in degrees.
    pub combined_angle_deg: f64,
    /// Maximum step of the boundary kernel toward the center.
    pub boundary_step: f64,
    /// Maximum rotation of the boundary kernel, in degrees.
    pub boundary_angle_deg: f64,
    /// Distance to the configuration bounding box that counts as "on the boundary".
    pub boundary_epsilon: f64,
    /// Maximum relative shrink of one squeeze move.
    pub squeeze_max_shrink: f64,
    /// Exponent of the heavy-tailed step length.
    pub levy_exponent: f64,
    /// Scale of the heavy-tailed step length.
    pub levy_scale: f64,
    /// Maximum translation of the pair kernel.
    pub pair_step: f64,
    /// Fixed magnitude of the jitter kernel.
    pub jitter_step: f64,
}

impl Default for MoveParams {
    fn default() -> Self {
        Self {
            translate_sigma: 0.5,
            center_step: 0.6,
            rotate_sigma_deg: 80.0,
            combined_step: 0.5,
            combined_angle_deg: 60.0,
            boundary_step: 0.7,
            boundary_angle_deg: 50.0,
            boundary_epsilon: 0.01,
            squeeze_max_shrink: 0.004,
            levy_exponent: 1.3,
            levy_scale: 0.008,
            pair_step: 0.3,
            jitter_step: 0.002,
        }
    }
}

impl MoveParams {
    fn validate(&self) -> Result<()> {
        let magnitudes = [
            ("translate_sigma", self.translate_sigma),
            ("center_step", self.center_step),
            ("rotate_sigma_deg", self.rotate_sigma_deg),
            ("combined_step", self.combined_step),
            ("combined_angle_deg", self.combined_angle_deg),
            ("boundary_step", self.boundary_step),
            ("boundary_angle_deg", self.boundary_angle_deg),
            ("boundary_epsilon", self.boundary_epsilon),
            ("levy_scale", self.levy_scale),
            ("pair_step", self.pair_step),
            ("jitter_step", self.jitter_step),
        ];
        for (name, value) in magnitudes {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::config(format!(
                    "moves.{} must be a finite non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(0.0..1.0).contains(&self.squeeze_max_shrink) {
            return Err(Error::config(format!(
                "moves.squeeze_max_shrink must be in [0, 1), got {}",
                self.squeeze_max_shrink
            )));
        }
        if !self.levy_exponent.is_finite() || self.levy_exponent <= 0.0 {
            return Err(Error::config(format!(
                "moves.levy_exponent must be positive, got {}",
                self.levy_exponent
            )));
        }
        Ok(())
    }
}

/// Configuration shared by all annealing drivers.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AnnealConfig {
    /// Starting temperature.
    pub t_max: f64,
    /// Final temperature.
    pub t_min: f64,
    /// Number of temperature steps.
    pub n_steps: usize,
    /// Iterations per temperature step.
    pub n_steps_per_t: usize,
    /// Cooling schedule.
    pub cooling: CoolingSchedule,
    /// Half-width of the uniform translation used by the basic perturbation.
    pub position_delta: f64,
    /// Standard deviation of the Gaussian rotation used by the basic perturbation.
    pub angle_delta: f64,
    /// Weight of the total overlap area in the penalized score.
    pub overlap_penalty: f64,
    /// Seed of the run's random generator.
    pub seed: u64,
    /// Log a progress line every `log_freq` iterations (0 = never).
    pub log_freq: usize,
    /// Wall-clock limit in milliseconds (0 = unlimited).
    pub time_limit_ms: u64,
    /// Move kernel magnitudes.
    pub moves: MoveParams,
}

impl Default for AnnealConfig {
    fn default() -> Self {
        Self {
            t_max: 0.0002,
            t_min: 0.00001,
            n_steps: 10,
            n_steps_per_t: 100,
            cooling: CoolingSchedule::Exponential,
            position_delta: 0.01,
            angle_delta: 30.0,
            overlap_penalty: 10.0,
            seed: 42,
            log_freq: 100,
            time_limit_ms: 0,
            moves: MoveParams::default(),
        }
    }
}

impl AnnealConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the temperature bounds.
    pub fn with_temperatures(mut self, t_max: f64, t_min: f64) -> Self {
        self.t_max = t_max;
        self.t_min = t_min;
        self
    }

    /// Sets the number of temperature steps and iterations per step.
    pub fn with_steps(mut self, n_steps: usize, n_steps_per_t: usize) -> Self {
        self.n_steps = n_steps;
        self.n_steps_per_t = n_steps_per_t;
        self
    }

    /// Sets the cooling schedule.
    pub fn with_cooling(mut self, cooling: CoolingSchedule) -> Self {
        self.cooling = cooling;
        self
    }

    /// Sets the basic perturbation magnitudes.
    pub fn with_deltas(mut self, position_delta: f64, angle_delta: f64) -> Self {
        self.position_delta = position_delta;
        self.angle_delta = angle_delta;
        self
    }

    /// Sets the overlap penalty weight.
    pub fn with_overlap_penalty(mut self, penalty: f64) -> Self {
        self.overlap_penalty = penalty;
        self
    }

    /// Sets the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the logging cadence.
    pub fn with_log_freq(mut self, log_freq: usize) -> Self {
        self.log_freq = log_freq;
        self
    }

    /// Sets the time limit in milliseconds.
    pub fn with_time_limit_ms(mut self, ms: u64) -> Self {
        self.time_limit_ms = ms;
        self
    }

    /// Sets the move kernel magnitudes.
    pub fn with_moves(mut self, moves: MoveParams) -> Self {
        self.moves = moves;
        self
    }

    /// Total iteration budget of one run.
    pub fn total_iterations(&self) -> u64 {
        self.n_steps as u64 * self.n_steps_per_t as u64
    }

    /// Time limit as a [`Duration`], if any.
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_ms > 0).then(|| Duration::from_millis(self.time_limit_ms))
    }

    /// Checks the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        if self.n_steps == 0 {
            return Err(Error::config("n_steps must be positive"));
        }
        if self.n_steps_per_t == 0 {
            return Err(Error::config("n_steps_per_t must be positive"));
        }
        if !self.t_max.is_finite() || self.t_max <= 0.0 {
            return Err(Error::config(format!(
                "t_max must be positive and finite, got {}",
                self.t_max
            )));
        }
        if !self.t_min.is_finite() || self.t_min <= 0.0 {
            return Err(Error::config(format!(
                "t_min must be positive and finite, got {}",
                self.t_min
            )));
        }
        if self.t_min > self.t_max {
            return Err(Error::config(format!(
                "t_min ({}) must not exceed t_max ({})",
                self.t_min, self.t_max
            )));
        }
        if let CoolingSchedule::Polynomial { degree } = self.cooling {
            if !degree.is_finite() || degree <= 0.0 {
                return Err(Error::config(format!(
                    "polynomial cooling degree must be positive, got {}",
                    degree
                )));
            }
        }
        if !self.position_delta.is_finite() || self.position_delta < 0.0 {
            return Err(Error::config("position_delta must be non-negative"));
        }
        if !self.angle_delta.is_finite() || self.angle_delta < 0.0 {
            return Err(Error::config("angle_delta must be non-negative"));
        }
        if !self.overlap_penalty.is_finite() || self.overlap_penalty < 0.0 {
            return Err(Error::config("overlap_penalty must be non-negative"));
        }
        self.moves.validate()
    }
}

/// Running temperature state of one annealing run.
#[derive(Debug, Clone)]
pub struct Temperature {
    schedule: CoolingSchedule,
    t_max: f64,
    t_min: f64,
    n_steps: usize,
    step: usize,
    current: f64,
}

impl Temperature {
    /// Starts a schedule at `t_max`.
    pub fn new(config: &AnnealConfig) -> Self {
        Self {
            schedule: config.cooling,
            t_max: config.t_max,
            t_min: config.t_min,
            n_steps: config.n_steps,
            step: 0,
            current: config.t_max,
        }
    }

    /// Current temperature.
    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Number of completed temperature steps.
    #[inline]
    pub fn step(&self) -> usize {
        self.step
    }

    /// Perturbation scale factor `clamp(T / T_max, 0, 1)`.
    #[inline]
    pub fn scale(&self) -> f64 {
        (self.current / self.t_max).clamp(0.0, 1.0)
    }

    /// Advances one temperature step and returns the new temperature.
    pub fn cool(&mut self) -> f64 {
        self.step = (self.step + 1).min(self.n_steps);
        self.current = self
            .schedule
            .temperature(self.step, self.n_steps, self.t_max, self.t_min);
        self.current
    }
}

/// Metropolis acceptance rule.
///
/// Improvements are always accepted; a worsening `delta` is accepted with
/// probability `exp(-delta / temperature)`.
#[inline]
pub fn metropolis_accept<R: Rng>(delta: f64, temperature: f64, rng: &mut R) -> bool {
    if delta < 0.0 {
        return true;
    }
    if temperature <= 0.0 || !delta.is_finite() {
        return false;
    }
    rng.gen::<f64>() < (-delta / temperature).exp()
}

/// Phase of an annealing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AnnealPhase {
    /// Run set up, about to start iterating.
    Running,
    /// Temperature update between blocks of iterations.
    Cooling,
    /// Budget exhausted, time limit reached or cancelled.
    Terminated,
}

/// Snapshot of an annealing run, passed to progress callbacks.
#[derive(Debug, Clone)]
pub struct AnnealProgress {
    /// Completed iterations.
    pub iteration: u64,
    /// Iteration budget.
    pub total_iterations: u64,
    /// Completed temperature steps.
    pub temperature_step: usize,
    /// Current temperature.
    pub temperature: f64,
    /// Score of the current configuration (side or penalized score).
    pub current_score: f64,
    /// Bounding-square side of the current configuration.
    pub current_side: f64,
    /// Tracked total overlap of the current configuration.
    pub current_overlap: f64,
    /// Side of the best valid configuration, if one has been seen.
    pub best_side: Option<f64>,
    /// Accepted moves so far.
    pub accepted: u64,
    /// Rejected moves so far.
    pub rejected: u64,
    /// Elapsed time in milliseconds.
    pub elapsed_ms: u64,
    /// Current phase.
    pub phase: AnnealPhase,
}

impl AnnealProgress {
    /// Fraction of the iteration budget already spent.
    pub fn progress_percent(&self) -> f64 {
        if self.total_iterations > 0 {
            self.iteration as f64 / self.total_iterations as f64
        } else {
            0.0
        }
    }
}

/// Derives an independent sub-seed for task `task` from a master seed.
///
/// Uses the SplitMix64 finalizer, so neighbouring task ids map to unrelated
/// streams while staying reproducible under a fixed master seed.
pub fn derive_seed(master: u64, task: u64) -> u64 {
    let mut z = master
        .wrapping_add(task.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
