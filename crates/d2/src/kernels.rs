//! Move kernels: parameterized perturbations with exact undo.
//!
//! Every kernel mutates the configuration in place and returns a [`Move`]
//! describing how to put it back. Magnitudes come from
//! [`MoveParams`](treepack_core::MoveParams) and, except for jitter and the
//! Levy step, are multiplied by the temperature scale `sc`.
//!
//! | Kernel | Target | Effect |
//! |--------|--------|--------|
//! | `Translate` | 1 shape | Gaussian offset in x and y |
//! | `CenterBias` | 1 shape | Step toward the bounding-box center by a random fraction |
//! | `Rotate` | 1 shape | Gaussian angle delta |
//! | `TranslateRotate` | 1 shape | Uniform offset and uniform angle delta |
//! | `Boundary` | 1 shape on the bounding-box edge | Step toward the center plus rotation |
//! | `Squeeze` | all shapes | Scale offsets from the center by a factor below 1 |
//! | `Levy` | 1 shape | Heavy-tailed step in a uniform direction |
//! | `Pair` | shapes `i`, `i + 1` | Identical uniform translation |
//! | `Swap` | 2 distinct shapes | Exchange positions and angles |
//! | `Jitter` | 1 shape | Fixed tiny uniform offset |
//! | `Perturb` | 1 shape | Uniform offset and clamped Gaussian angle delta |

use crate::configuration::Configuration;
use crate::shape::bounding_box;
use rand::Rng;
use rand_distr::StandardNormal;
use std::f64::consts::TAU;
use treepack_core::{AnnealConfig, Placement};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction lengths below this fall back to a random unit vector.
const MIN_DIRECTION: f64 = 1e-6;

/// Perturbation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MoveKind {
    Translate,
    CenterBias,
    Rotate,
    TranslateRotate,
    Boundary,
    Squeeze,
    Levy,
    Pair,
    Swap,
    Jitter,
    /// Single-shape move of the basic drivers.
    Perturb,
}

impl MoveKind {
    /// Kernel set of the extended driver, selected uniformly.
    pub const EXTENDED: [MoveKind; 10] = [
        MoveKind::Translate,
        MoveKind::CenterBias,
        MoveKind::Rotate,
        MoveKind::TranslateRotate,
        MoveKind::Boundary,
        MoveKind::Squeeze,
        MoveKind::Levy,
        MoveKind::Pair,
        MoveKind::Swap,
        MoveKind::Jitter,
    ];

    /// Returns true if the kernel moves every shape.
    pub fn is_global(&self) -> bool {
        matches!(self, MoveKind::Squeeze)
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            MoveKind::Translate => "translate",
            MoveKind::CenterBias => "center_bias",
            MoveKind::Rotate => "rotate",
            MoveKind::TranslateRotate => "translate_rotate",
            MoveKind::Boundary => "boundary",
            MoveKind::Squeeze => "squeeze",
            MoveKind::Levy => "levy",
            MoveKind::Pair => "pair",
            MoveKind::Swap => "swap",
            MoveKind::Jitter => "jitter",
            MoveKind::Perturb => "perturb",
        }
    }
}

/// State needed to undo a move.
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    /// Prior placements of the shapes that moved.
    Partial(Vec<(usize, Placement)>),
    /// Full prior configuration.
    Snapshot(Vec<Placement>),
}

/// An applied move and its undo record.
#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub kind: MoveKind,
    pub undo: Undo,
}

impl Move {
    fn partial(kind: MoveKind, prior: Vec<(usize, Placement)>) -> Self {
        Self {
            kind,
            undo: Undo::Partial(prior),
        }
    }

    /// Returns true if the move touched every shape.
    pub fn is_global(&self) -> bool {
        matches!(self.undo, Undo::Snapshot(_))
    }

    /// Indices of moved shapes (empty for global moves).
    pub fn touched(&self) -> Vec<usize> {
        match &self.undo {
            Undo::Partial(prior) => prior.iter().map(|(i, _)| *i).collect(),
            Undo::Snapshot(_) => Vec::new(),
        }
    }

    /// Prior placements of the moved shapes, for single and pair moves.
    pub fn prior_group(&self) -> Option<&[(usize, Placement)]> {
        match &self.undo {
            Undo::Partial(prior) => Some(prior),
            Undo::Snapshot(_) => None,
        }
    }

    /// Current placements of the moved shapes.
    pub fn current_group(&self, config: &Configuration) -> Vec<(usize, Placement)> {
        self.touched().into_iter().map(|i| (i, config[i])).collect()
    }

    /// Restores the configuration exactly as it was before the move.
    pub fn revert(&self, config: &mut Configuration) {
        match &self.undo {
            Undo::Partial(prior) => {
                for &(i, p) in prior.iter().rev() {
                    config[i] = p;
                }
            }
            Undo::Snapshot(snapshot) => config.restore(snapshot),
        }
    }
}

/// Applies kernel `kind` with temperature scale `sc`.
///
/// Returns `None` when the kernel has nothing to do (too few shapes, no
/// boundary candidates, vanishing squeeze); the configuration is then
/// unchanged.
pub fn apply<R: Rng>(
    kind: MoveKind,
    config: &mut Configuration,
    params: &AnnealConfig,
    sc: f64,
    rng: &mut R,
) -> Option<Move> {
    let n = config.len();
    if n == 0 {
        return None;
    }
    let moves = &params.moves;
    let sc = sc.clamp(0.0, 1.0);

    match kind {
        MoveKind::Translate => {
            let i = rng.gen_range(0..n);
            let dx = gaussian(rng) * moves.translate_sigma * sc;
            let dy = gaussian(rng) * moves.translate_sigma * sc;
            Some(single(kind, config, i, |p| p.translate(dx, dy)))
        }
        MoveKind::CenterBias => {
            let i = rng.gen_range(0..n);
            let (ux, uy) = toward_center(config, i, rng);
            let step = rng.gen::<f64>() * moves.center_step * sc;
            Some(single(kind, config, i, |p| p.translate(ux * step, uy * step)))
        }
        MoveKind::Rotate => {
            let i = rng.gen_range(0..n);
            let da = gaussian(rng) * moves.rotate_sigma_deg * sc;
            Some(single(kind, config, i, |p| p.rotate(da)))
        }
        MoveKind::TranslateRotate => {
            let i = rng.gen_range(0..n);
            let dx = symmetric(rng) * moves.combined_step * sc;
            let dy = symmetric(rng) * moves.combined_step * sc;
            let da = symmetric(rng) * moves.combined_angle_deg * sc;
            Some(single(kind, config, i, |p| {
                p.translate(dx, dy);
                p.rotate(da);
            }))
        }
        MoveKind::Boundary => {
            let candidates = boundary_indices(config, moves.boundary_epsilon);
            if candidates.is_empty() {
                return None;
            }
            let i = candidates[rng.gen_range(0..candidates.len())];
            let (ux, uy) = toward_center(config, i, rng);
            let step = rng.gen::<f64>() * moves.boundary_step * sc;
            let da = symmetric(rng) * moves.boundary_angle_deg * sc;
            Some(single(kind, config, i, |p| {
                p.translate(ux * step, uy * step);
                p.rotate(da);
            }))
        }
        MoveKind::Squeeze => {
            // 1 - u lies in (0, 1], so any positive scale shrinks strictly
            let factor = 1.0 - (1.0 - rng.gen::<f64>()) * moves.squeeze_max_shrink * sc;
            if factor >= 1.0 {
                return None;
            }
            let snapshot = config.placements().to_vec();
            let (cx, cy) = config.center();
            config.scale_about(cx, cy, factor);
            Some(Move {
                kind,
                undo: Undo::Snapshot(snapshot),
            })
        }
        MoveKind::Levy => {
            let i = rng.gen_range(0..n);
            let u: f64 = rng.gen();
            let length = (u + 0.001).powf(-moves.levy_exponent) * moves.levy_scale;
            let theta = rng.gen::<f64>() * TAU;
            let (dx, dy) = (length * theta.cos(), length * theta.sin());
            Some(single(kind, config, i, |p| p.translate(dx, dy)))
        }
        MoveKind::Pair => {
            if n < 2 {
                return None;
            }
            let i = rng.gen_range(0..n);
            let j = (i + 1) % n;
            let dx = symmetric(rng) * moves.pair_step * sc;
            let dy = symmetric(rng) * moves.pair_step * sc;
            let prior = vec![(i, config[i]), (j, config[j])];
            config[i].translate(dx, dy);
            config[j].translate(dx, dy);
            Some(Move::partial(kind, prior))
        }
        MoveKind::Swap => {
            if n < 2 {
                return None;
            }
            let i = rng.gen_range(0..n);
            let mut j = rng.gen_range(0..n - 1);
            if j >= i {
                j += 1;
            }
            Some(swap(config, i, j))
        }
        MoveKind::Jitter => {
            let i = rng.gen_range(0..n);
            let dx = symmetric(rng) * moves.jitter_step;
            let dy = symmetric(rng) * moves.jitter_step;
            Some(single(kind, config, i, |p| p.translate(dx, dy)))
        }
        MoveKind::Perturb => {
            let i = rng.gen_range(0..n);
            let dx = symmetric(rng) * params.position_delta;
            let dy = symmetric(rng) * params.position_delta;
            let da = (gaussian(rng) * params.angle_delta).clamp(-180.0, 180.0);
            Some(single(kind, config, i, |p| {
                p.translate(dx, dy);
                p.rotate(da);
            }))
        }
    }
}

/// Exchanges the poses of shapes `i` and `j`; ids stay in place.
pub fn swap(config: &mut Configuration, i: usize, j: usize) -> Move {
    let prior = vec![(i, config[i]), (j, config[j])];
    let (mut a, mut b) = (config[i], config[j]);
    a.swap_pose(&mut b);
    config[i] = a;
    config[j] = b;
    Move::partial(MoveKind::Swap, prior)
}

/// Indices of shapes whose boxes lie within `epsilon` of the configuration's
/// bounding-box edge.
pub fn boundary_indices(config: &Configuration, epsilon: f64) -> Vec<usize> {
    if config.is_empty() {
        return Vec::new();
    }
    let global = config.bounds();
    config
        .iter()
        .enumerate()
        .filter(|(_, p)| {
            let b = bounding_box(p);
            b.min_x - global.min_x < epsilon
                || global.max_x - b.max_x < epsilon
                || b.min_y - global.min_y < epsilon
                || global.max_y - b.max_y < epsilon
        })
        .map(|(i, _)| i)
        .collect()
}

fn single<F>(kind: MoveKind, config: &mut Configuration, i: usize, mutate: F) -> Move
where
    F: FnOnce(&mut Placement),
{
    let prior = vec![(i, config[i])];
    mutate(&mut config[i]);
    Move::partial(kind, prior)
}

/// Unit vector from shape `i` to the bounding-box center.
fn toward_center<R: Rng>(config: &Configuration, i: usize, rng: &mut R) -> (f64, f64) {
    let (cx, cy) = config.center();
    let dx = cx - config[i].x;
    let dy = cy - config[i].y;
    let d = dx.hypot(dy);
    if d > MIN_DIRECTION {
        (dx / d, dy / d)
    } else {
        let theta = rng.gen::<f64>() * TAU;
        (theta.cos(), theta.sin())
    }
}

#[inline]
fn gaussian<R: Rng>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

#[inline]
fn symmetric<R: Rng>(rng: &mut R) -> f64 {
    rng.gen::<f64>() * 2.0 - 1.0
}
