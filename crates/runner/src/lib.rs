//! Batch runner for the tree packing engine.
//!
//! This crate provides:
//! - Per-`n` batch orchestration over a rayon pool
//! - Submission CSV reading and writing
//! - TOML/JSON annealing configuration files

mod batch;
mod config;
mod submission;

pub use batch::{
    rounding_safe, score_layouts, to_layouts, total_score, Algorithm, BatchConfig, BatchError,
    BatchRunner, LayoutResult, Seeding,
};
pub use config::{
    load_config, parse_config, render_config, save_config, ConfigError, ConfigFormat,
};
pub use submission::{
    format_row, load as load_submission, read_csv, rounded, save as save_submission, write_csv,
    Layouts, SubmissionError, HEADER,
};
