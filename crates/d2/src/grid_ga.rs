//! Block-grid layouts tuned by a genetic algorithm.
//!
//! A block is a pair of trees: one at angle `α`, its partner at `α + 180°`
//! offset by `(dx, dy)`. The genome is `(α, dx, dy)`. Blocks are tiled in a
//! grid sized to hold `n` trees (block spacing is the block's bounding box
//! plus 5%), then whole block columns slide toward column 0 and whole rows
//! toward row 0 while nothing collides.
//!
//! Scores are bounding-square sides. Layouts that cannot be built score high
//! so selection drops them:
//!
//! | Outcome | Score |
//! |---------|-------|
//! | no collision-free spacing for the pair | 10 000 |
//! | `k` trees could not be placed | 1 000 + 10 k |
//! | `k` colliding pairs remain | 500 + 50 k |

use crate::collision::intersects;
use crate::configuration::Configuration;
use crate::scoring;
use crate::shape::bounding_box;
use crate::spatial_index::SpatialIndex2D;
use rand::Rng;
use rand_distr::StandardNormal;
use treepack_core::{
    normalize_angle, GaConfig, GaProblem, GaResult, GaRunner, Individual, Placement,
};

const BLOCK_SPACING: f64 = 1.05;
const PAIR_SCALE_STEPS: usize = 20;
const PAIR_NUDGE: f64 = 0.05;
const COMPACT_STEP: f64 = 0.02;
const COMPACT_ITERATIONS: usize = 300;

const INVALID_PAIR_SCORE: f64 = 10_000.0;
const MISSING_TREE_SCORE: f64 = 1_000.0;
const COLLISION_SCORE: f64 = 500.0;

/// Genome of a block grid.
#[derive(Debug, Clone)]
pub struct BlockGenome {
    /// Angle of the first tree of every block, degrees.
    pub angle_deg: f64,
    /// Horizontal offset of the partner tree.
    pub dx: f64,
    /// Vertical offset of the partner tree.
    pub dy: f64,
    score: f64,
    layout: Option<Configuration>,
}

impl BlockGenome {
    /// Creates an unevaluated genome.
    pub fn new(angle_deg: f64, dx: f64, dy: f64) -> Self {
        Self {
            angle_deg: normalize_angle(angle_deg),
            dx,
            dy,
            score: f64::INFINITY,
            layout: None,
        }
    }

    /// Score of the last evaluation (infinity if unevaluated).
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Complete collision-free layout of the last evaluation, if it produced one.
    pub fn layout(&self) -> Option<&Configuration> {
        self.layout.as_ref()
    }

    fn reset(&mut self) {
        self.score = f64::INFINITY;
        self.layout = None;
    }
}

impl Individual for BlockGenome {
    fn fitness(&self) -> f64 {
        -self.score
    }

    /// Around the tilted interlocking pair: α in 40..80, dx in -0.8..-0.4,
    /// dy in -0.3..0.1.
    fn random<R: Rng>(rng: &mut R) -> Self {
        Self::new(
            60.0 + (rng.gen::<f64>() - 0.5) * 40.0,
            -0.6 + (rng.gen::<f64>() - 0.5) * 0.4,
            -0.1 + (rng.gen::<f64>() - 0.5) * 0.4,
        )
    }

    fn crossover<R: Rng>(&self, other: &Self, rng: &mut R) -> Self {
        let a: f64 = rng.gen();
        Self::new(
            self.angle_deg * a + other.angle_deg * (1.0 - a),
            self.dx * a + other.dx * (1.0 - a),
            self.dy * a + other.dy * (1.0 - a),
        )
    }

    fn mutate<R: Rng>(&mut self, rng: &mut R) {
        if rng.gen_bool(0.5) {
            let delta: f64 = rng.sample(StandardNormal);
            self.angle_deg = normalize_angle(self.angle_deg + delta * 10.0);
        }
        if rng.gen_bool(0.5) {
            let delta: f64 = rng.sample(StandardNormal);
            self.dx += delta * 0.2;
        }
        if rng.gen_bool(0.5) {
            let delta: f64 = rng.sample(StandardNormal);
            self.dy += delta * 0.2;
        }
        self.reset();
    }
}

/// Block-grid layout of a fixed number of trees.
#[derive(Debug, Clone, Copy)]
pub struct BlockGridProblem {
    /// Trees to place.
    pub n: usize,
}

impl GaProblem for BlockGridProblem {
    type Individual = BlockGenome;

    fn evaluate(&self, genome: &mut BlockGenome) {
        let (score, layout) = block_layout(self.n, genome.angle_deg, genome.dx, genome.dy);
        genome.score = score;
        genome.layout = layout;
    }

    fn on_generation(&self, generation: u32, best: &BlockGenome) {
        log::trace!(
            "grid GA n={} generation {}: score {:.5} (angle {:.1}, dx {:.3}, dy {:.3})",
            self.n,
            generation,
            best.score,
            best.angle_deg,
            best.dx,
            best.dy
        );
    }
}

/// Evolves block-grid genomes for `n` trees.
pub fn evolve<R: Rng>(n: usize, config: &GaConfig, rng: &mut R) -> GaResult<BlockGenome> {
    let result = GaRunner::new(config.clone(), BlockGridProblem { n }).run(rng);
    log::debug!(
        "grid GA n={}: best score {:.5} after {} generations (angle {:.1}, dx {:.3}, dy {:.3})",
        n,
        result.best.score,
        result.generations,
        result.best.angle_deg,
        result.best.dx,
        result.best.dy
    );
    result
}

/// Builds and scores the block grid of one genome.
///
/// Returns the score and, when the layout holds `n` trees without collision,
/// the layout.
pub fn block_layout(n: usize, angle_deg: f64, dx: f64, dy: f64) -> (f64, Option<Configuration>) {
    if n == 0 {
        return (0.0, Some(Configuration::default()));
    }
    let Some((dx, dy)) = valid_pair_spacing(angle_deg, dx, dy) else {
        return (INVALID_PAIR_SCORE, None);
    };

    let (width, height) = block_size(angle_deg, dx, dy);
    let (pitch_x, pitch_y) = (width * BLOCK_SPACING, height * BLOCK_SPACING);
    let (per_row, rows) = grid_shape(n.div_ceil(2), pitch_x, pitch_y);

    let mut grid = BlockGrid::default();
    'rows: for row in 0..rows {
        for col in 0..per_row {
            let (x, y) = (col as f64 * pitch_x, row as f64 * pitch_y);
            for (px, py, angle) in [(x, y, angle_deg), (x + dx, y + dy, angle_deg + 180.0)] {
                if grid.trees.len() == n {
                    break 'rows;
                }
                grid.try_place(Placement::new(grid.trees.len(), px, py, angle), row, col);
            }
        }
    }

    for col in 1..per_row {
        grid.slide(|(_, c)| c >= col, -COMPACT_STEP, 0.0);
    }
    for row in 1..rows {
        grid.slide(|(r, _)| r >= row, 0.0, -COMPACT_STEP);
    }

    let config = Configuration::new(grid.trees);
    if config.len() < n {
        let missing = (n - config.len()) as f64;
        return (MISSING_TREE_SCORE + missing * 10.0, None);
    }
    let collisions = scoring::colliding_pairs(&config).len();
    if collisions > 0 {
        return (COLLISION_SCORE + collisions as f64 * 50.0, None);
    }
    (config.side(), Some(config))
}

/// Finds a collision-free partner offset near `(dx, dy)`.
///
/// Tries the offset itself, then scales it up in steps of 0.1 to 3x, each
/// scale with nudges of ±0.05 on either axis.
pub fn valid_pair_spacing(angle_deg: f64, dx: f64, dy: f64) -> Option<(f64, f64)> {
    let collides = |dx: f64, dy: f64| {
        intersects(
            &Placement::new(0, 0.0, 0.0, angle_deg),
            &Placement::new(1, dx, dy, angle_deg + 180.0),
        )
    };

    if !collides(dx, dy) {
        return Some((dx, dy));
    }
    let nudges = [-PAIR_NUDGE, 0.0, PAIR_NUDGE];
    for k in 0..=PAIR_SCALE_STEPS {
        let scale = 1.0 + k as f64 * 0.1;
        let (sx, sy) = (dx * scale, dy * scale);
        if !collides(sx, sy) {
            return Some((sx, sy));
        }
        for nx in nudges {
            for ny in nudges {
                if !collides(sx + nx, sy + ny) {
                    return Some((sx + nx, sy + ny));
                }
            }
        }
    }
    None
}

/// Width and height of one block's bounding box.
fn block_size(angle_deg: f64, dx: f64, dy: f64) -> (f64, f64) {
    let first = bounding_box(&Placement::new(0, 0.0, 0.0, angle_deg));
    let second = bounding_box(&Placement::new(1, dx, dy, angle_deg + 180.0));
    let aabb = first.union(&second);
    (aabb.width(), aabb.height())
}

/// Blocks per row and row count for `blocks` blocks, preferring a square
/// footprint: minimizes `|W - H| + 0.1 max(W, H)`.
fn grid_shape(blocks: usize, pitch_x: f64, pitch_y: f64) -> (usize, usize) {
    let mut best = (1, blocks.max(1));
    let mut best_metric = f64::INFINITY;
    for per_row in 1..=blocks.max(1) {
        let rows = blocks.div_ceil(per_row).max(1);
        let width = per_row as f64 * pitch_x;
        let height = rows as f64 * pitch_y;
        let metric = (width - height).abs() + width.max(height) * 0.1;
        if metric < best_metric {
            best_metric = metric;
            best = (per_row, rows);
        }
    }
    best
}

/// Trees placed so far with their grid cells.
#[derive(Default)]
struct BlockGrid {
    trees: Vec<Placement>,
    cells: Vec<(usize, usize)>,
    index: SpatialIndex2D,
}

impl BlockGrid {
    fn collides(&self, candidate: &Placement, moving: &[bool]) -> bool {
        self.index
            .query(&bounding_box(candidate))
            .into_iter()
            .filter(|&j| !moving.get(j).copied().unwrap_or(false))
            .any(|j| intersects(candidate, &self.trees[j]))
    }

    /// Places the tree unless it collides with one already placed.
    fn try_place(&mut self, tree: Placement, row: usize, col: usize) {
        if self.collides(&tree, &[]) {
            return;
        }
        self.index.insert(self.trees.len(), bounding_box(&tree));
        self.trees.push(tree);
        self.cells.push((row, col));
    }

    /// Translates the selected trees together by `(dx, dy)` repeatedly until
    /// one of them would hit a tree that is not moving.
    fn slide<F>(&mut self, selected: F, dx: f64, dy: f64)
    where
        F: Fn((usize, usize)) -> bool,
    {
        let moving: Vec<bool> = self.cells.iter().map(|&cell| selected(cell)).collect();
        if !moving.contains(&true) {
            return;
        }

        for _ in 0..COMPACT_ITERATIONS {
            let blocked = self.trees.iter().zip(&moving).any(|(tree, &m)| {
                let mut shifted = *tree;
                shifted.translate(dx, dy);
                m && self.collides(&shifted, &moving)
            });
            if blocked {
                break;
            }
            for (i, tree) in self.trees.iter_mut().enumerate() {
                if moving[i] {
                    tree.translate(dx, dy);
                    self.index.update(i, bounding_box(tree));
                }
            }
        }
    }
}
