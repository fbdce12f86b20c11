//! # Treepack Core
//!
//! Shape-independent building blocks for the treepack packing engine.
//!
//! This crate provides the types shared by the 2D engine and the runner:
//!
//! - **Placement**: [`Placement`] - position and rotation of one shape instance
//! - **Bounding boxes**: [`AABB2D`]
//! - **Annealing framework**: [`AnnealConfig`], [`CoolingSchedule`], [`Temperature`],
//!   [`metropolis_accept`], [`AnnealPhase`], [`AnnealProgress`]
//! - **Genetic algorithm framework**: [`GaConfig`], [`GaProblem`], [`GaRunner`]
//! - **Errors**: [`Error`], [`Result`]
//!
//! ## Configuration
//!
//! ```rust
//! use treepack_core::{AnnealConfig, CoolingSchedule};
//!
//! let config = AnnealConfig::new()
//!     .with_temperatures(0.0002, 0.00001)
//!     .with_steps(10, 100)
//!     .with_cooling(CoolingSchedule::Polynomial { degree: 4.0 })
//!     .with_seed(42);
//! assert!(config.validate().is_ok());
//! ```
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization support

pub mod error;
pub mod ga;
pub mod placement;
pub mod sa;
pub mod transform;

// Re-exports
pub use error::{Error, Result};
pub use ga::{GaConfig, GaProblem, GaResult, GaRunner, Individual};
pub use placement::{normalize_angle, Placement};
pub use sa::{
    derive_seed, metropolis_accept, AnnealConfig, AnnealPhase, AnnealProgress, CoolingSchedule,
    MoveParams, Temperature,
};
pub use transform::AABB2D;
