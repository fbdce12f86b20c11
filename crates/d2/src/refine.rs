//! Deterministic post-processing of collision-free configurations.
//!
//! Every refiner only takes moves that keep the configuration collision-free
//! and, except for [`kick`], only moves that strictly shrink the bounding
//! square. Feeding a collision-free configuration in therefore never yields a
//! larger or colliding one.

use crate::configuration::Configuration;
use crate::scoring::CollisionIndex;
use rand::Rng;
use rand_distr::StandardNormal;
use treepack_core::Placement;

/// Required side improvement for a refining move to count.
const MIN_IMPROVEMENT: f64 = 1e-12;

const SQUEEZE_START: f64 = 0.9995;
const SQUEEZE_END: f64 = 0.98;
const SQUEEZE_STEP: f64 = 0.0005;

const COMPACTION_STEPS: [f64; 5] = [0.02, 0.008, 0.003, 0.001, 0.0004];

const LOCAL_STEPS: [f64; 6] = [0.01, 0.004, 0.0015, 0.0006, 0.00025, 0.0001];
const LOCAL_ROTATIONS: [f64; 5] = [5.0, 2.0, 0.8, 0.3, 0.1];
const DIRECTIONS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (1.0, 1.0),
    (1.0, -1.0),
    (-1.0, 1.0),
    (-1.0, -1.0),
];

/// Shrinks the whole configuration about its initial center by successive
/// factors 0.9995, 0.999, ... down to 0.98, stopping at the first factor that
/// would collide.
pub fn squeeze(config: &Configuration) -> Configuration {
    let mut current = config.clone();
    if current.len() < 2 {
        return current;
    }
    let (cx, cy) = config.center();

    let mut k = 0;
    loop {
        let scale = SQUEEZE_START - k as f64 * SQUEEZE_STEP;
        if scale < SQUEEZE_END - 1e-12 {
            break;
        }
        let mut trial = current.clone();
        trial.scale_about(cx, cy, scale);
        if CollisionIndex::new(&trial).any_collision(&trial) {
            break;
        }
        current = trial;
        k += 1;
    }
    current
}

/// Pulls every shape toward the bounding-box center with decreasing step
/// sizes, keeping only collision-free steps that shrink the side.
///
/// Stops after `iters` sweeps or the first sweep without improvement.
pub fn compaction(config: &Configuration, iters: usize) -> Configuration {
    let mut refiner = Refiner::new(config);
    for _ in 0..iters {
        let (cx, cy) = refiner.config.center();
        let mut improved = false;

        for i in 0..refiner.config.len() {
            let p = refiner.config[i];
            let (dx, dy) = (cx - p.x, cy - p.y);
            let d = dx.hypot(dy);
            if d < 1e-6 {
                continue;
            }
            for step in COMPACTION_STEPS {
                let mut trial = refiner.config[i];
                trial.translate(dx / d * step, dy / d * step);
                improved |= refiner.try_move(i, trial);
            }
        }

        if !improved {
            break;
        }
    }
    refiner.config
}

/// Tries center moves, 8-direction moves and small rotations for every shape,
/// keeping only collision-free moves that shrink the side.
///
/// Stops after `max_iter` sweeps or the first sweep without improvement.
pub fn local_search(config: &Configuration, max_iter: usize) -> Configuration {
    let mut refiner = Refiner::new(config);
    for _ in 0..max_iter {
        let mut improved = false;

        for i in 0..refiner.config.len() {
            let (cx, cy) = refiner.config.center();
            let p = refiner.config[i];
            let (dx, dy) = (cx - p.x, cy - p.y);
            let d = dx.hypot(dy);

            if d > 1e-6 {
                for step in LOCAL_STEPS {
                    let mut trial = refiner.config[i];
                    trial.translate(dx / d * step, dy / d * step);
                    improved |= refiner.try_move(i, trial);
                }
            }

            for step in LOCAL_STEPS {
                for (ux, uy) in DIRECTIONS {
                    let mut trial = refiner.config[i];
                    trial.translate(ux * step, uy * step);
                    improved |= refiner.try_move(i, trial);
                }
            }

            for rotation in LOCAL_ROTATIONS {
                for delta in [rotation, -rotation] {
                    let mut trial = refiner.config[i];
                    trial.rotate(delta);
                    improved |= refiner.try_move(i, trial);
                }
            }
        }

        if !improved {
            break;
        }
    }
    refiner.config
}

/// Squeeze, then compaction, then local search.
pub fn polish(config: &Configuration, iters: usize) -> Configuration {
    let squeezed = squeeze(config);
    let compacted = compaction(&squeezed, iters);
    local_search(&compacted, iters)
}

/// Random restart kick: perturbs a few shapes, then pushes overlapping shapes
/// outward until the configuration is collision-free again.
///
/// Returns the input unchanged if the repair does not succeed.
pub fn kick<R: Rng>(config: &Configuration, strength: f64, rng: &mut R) -> Configuration {
    let n = config.len();
    if n == 0 {
        return config.clone();
    }
    let mut c = config.clone();

    let count = ((n as f64 * 0.08 + strength * 3.0) as usize).max(1);
    for _ in 0..count {
        let i = rng.gen_range(0..n);
        let dx = rng.sample::<f64, _>(StandardNormal) * strength * 0.5;
        let dy = rng.sample::<f64, _>(StandardNormal) * strength * 0.5;
        let da = rng.sample::<f64, _>(StandardNormal) * 30.0;
        c[i].translate(dx, dy);
        c[i].rotate(da);
    }

    let mut index = CollisionIndex::new(&c);
    for _ in 0..150 {
        let mut fixed = true;
        for i in 0..n {
            if !index.group_collides(&c, &[(i, c[i])]) {
                continue;
            }
            fixed = false;
            let (cx, cy) = c.center();
            let (dx, dy) = (c[i].x - cx, c[i].y - cy);
            let d = dx.hypot(dy);
            if d > 1e-6 {
                c[i].translate(dx / d * 0.02, dy / d * 0.02);
            }
            c[i].rotate((rng.gen::<f64>() * 2.0 - 1.0) * 15.0);
            index.commit(&c, &[i]);
        }
        if fixed {
            break;
        }
    }

    if index.any_collision(&c) {
        log::trace!("kick could not repair overlaps, keeping the input");
        return config.clone();
    }
    c
}

/// Single-shape greedy improvement state.
struct Refiner {
    config: Configuration,
    index: CollisionIndex,
    side: f64,
}

impl Refiner {
    fn new(config: &Configuration) -> Self {
        let index = CollisionIndex::new(config);
        Self {
            side: index.side(),
            config: config.clone(),
            index,
        }
    }

    /// Moves shape `i` to `trial` if that is collision-free and shrinks the side.
    fn try_move(&mut self, i: usize, trial: Placement) -> bool {
        let group = [(i, trial)];
        if self.index.group_collides(&self.config, &group) {
            return false;
        }
        let side = self.index.side_with(&group);
        if side >= self.side - MIN_IMPROVEMENT {
            return false;
        }
        self.config[i] = trial;
        self.index.commit(&self.config, &[i]);
        self.side = side;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::has_collision;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_squeeze_stops_before_collision() {
        let cfg = Configuration::from_poses([(0.0, 0.0, 0.0), (0.72, 0.0, 0.0)]);
        let out = squeeze(&cfg);
        assert!(!has_collision(&out));
        assert!(out.side() <= cfg.side());
    }

    #[test]
    fn test_squeeze_far_apart_uses_full_range() {
        let cfg = Configuration::from_poses([(0.0, 0.0, 0.0), (100.0, 0.0, 0.0)]);
        let out = squeeze(&cfg);
        // Every factor from 0.9995 down to 0.98 is applied in turn
        let factor: f64 = (0..40).map(|k| 0.9995 - k as f64 * 0.0005).product();
        let gap = out[1].x - out[0].x;
        assert!((gap - 100.0 * factor).abs() < 1e-9, "gap = {}", gap);
    }

    #[test]
    fn test_compaction_pulls_together() {
        let cfg = Configuration::from_poses([(0.0, 0.0, 0.0), (3.0, 0.0, 0.0), (1.5, 2.0, 0.0)]);
        let out = compaction(&cfg, 200);
        assert!(!has_collision(&out));
        assert!(out.side() < cfg.side());
    }

    #[test]
    fn test_local_search_never_grows() {
        let cfg =
            Configuration::from_poses([(0.0, 0.0, 10.0), (1.0, 0.3, 200.0), (0.4, 1.4, 90.0)]);
        assert!(!has_collision(&cfg));
        let out = local_search(&cfg, 5);
        assert!(!has_collision(&out));
        assert!(out.side() <= cfg.side());
        for p in out.iter() {
            assert!((0.0..360.0).contains(&p.angle_deg));
        }
    }

    #[test]
    fn test_polish_single_tree() {
        let cfg = Configuration::from_poses([(2.0, 2.0, 45.0)]);
        let out = polish(&cfg, 10);
        assert!(out.side() <= cfg.side() + 1e-12);
    }

    #[test]
    fn test_kick_keeps_validity() {
        let cfg = Configuration::from_poses((0..6).map(|i| (i as f64 * 0.9, 0.0, 0.0)));
        let mut rng = StdRng::seed_from_u64(17);
        for _ in 0..10 {
            let out = kick(&cfg, 0.3, &mut rng);
            assert_eq!(out.len(), cfg.len());
            assert!(!has_collision(&out));
        }
    }
}
