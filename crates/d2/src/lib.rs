//! # Treepack 2D
//!
//! Packing engine for a fixed concave "tree" polygon: find the smallest square
//! that holds `n` non-overlapping copies.
//!
//! This crate provides the geometry and search machinery:
//!
//! - **Shape geometry** ([`shape`]): the tree template, oriented polygons, exact bounding boxes
//! - **Intersection engine** ([`collision`]): exact overlap area via polygon boolean intersection
//! - **Spatial index** ([`SpatialIndex2D`]): R*-tree broad phase keyed by configuration index
//! - **Scoring** ([`scoring`]): bounding-square side, overlap totals, [`CollisionIndex`]
//! - **Move kernels** ([`kernels`]): perturbations with exact undo
//! - **Annealing drivers** ([`anneal`]): strict, penalty and extended multi-kernel variants
//! - **Refiners** ([`refine`]) and **seeders** ([`seed`]), including the block-grid GA
//!   ([`grid_ga`])
//!
//! ## Quick Start
//!
//! ```rust
//! use treepack_d2::{anneal, scoring, seed, AnnealConfig};
//!
//! let initial = seed::lattice(5);
//! let config = AnnealConfig::new()
//!     .with_steps(4, 50)
//!     .with_seed(7)
//!     .with_log_freq(0);
//!
//! let (side, best) = anneal::solve_strict(&initial, &config).unwrap();
//! assert!(!scoring::has_collision(&best));
//! assert!(side <= initial.side());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod anneal;
pub mod collision;
pub mod configuration;
pub mod grid_ga;
pub mod kernels;
pub mod refine;
pub mod scoring;
pub mod seed;
pub mod shape;
pub mod spatial_index;

// Re-exports
pub use anneal::{
    solve_extended, solve_penalty, solve_strict, AcceptancePolicy, AnnealResult, Annealer,
    AnnealingContext, ExtendedMode, FullKernelSet, KernelSelector, PenaltyAcceptance,
    SingleShapePerturb, StrictAcceptance,
};
pub use collision::{intersects, overlap_area, CONTACT_AREA_EPSILON};
pub use configuration::Configuration;
pub use kernels::{Move, MoveKind, Undo};
pub use scoring::CollisionIndex;
pub use shape::{bounding_box, oriented_polygon, TREE_TEMPLATE};
pub use spatial_index::{SpatialEntry2D, SpatialIndex2D};

// Re-export core types
pub use treepack_core::{
    AnnealConfig, AnnealPhase, AnnealProgress, CoolingSchedule, Error, MoveParams, Placement,
    Result, AABB2D,
};
