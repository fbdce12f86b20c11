//! Integration tests for treepack-runner.

use tempfile::tempdir;
use treepack_core::AnnealConfig;
use treepack_runner::{
    load_config, load_submission, save_config, save_submission, score_layouts, to_layouts,
    Algorithm, BatchConfig, BatchRunner, ConfigError, Layouts, Seeding, SubmissionError,
};

fn quick_anneal() -> AnnealConfig {
    AnnealConfig::default()
        .with_temperatures(0.01, 0.0005)
        .with_steps(3, 60)
        .with_log_freq(0)
}

#[test]
fn test_batch_to_submission_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out").join("submission.csv");

    let results = BatchRunner::new(
        BatchConfig::new()
            .with_max_n(6)
            .with_algorithm(Algorithm::Extended)
            .with_anneal(quick_anneal()),
    )
    .run(&Layouts::new())
    .unwrap();
    assert!(results.iter().all(|r| r.valid));

    save_submission(&path, &to_layouts(&results)).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 1 + (1..=6).sum::<usize>());

    let loaded = load_submission(&path).unwrap();
    assert_eq!(loaded.len(), 6);
    for (r, s) in results.iter().zip(score_layouts(&loaded)) {
        assert_eq!(r.n, s.n);
        assert!(s.valid);
        // Six decimals of rounding
        assert!((r.side - s.side).abs() < 1e-5);
    }
}

#[test]
fn test_resume_from_submission() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("start.csv");

    let seeded = BatchRunner::new(
        BatchConfig::new()
            .with_max_n(4)
            .with_algorithm(Algorithm::Seed)
            .with_seeding(Seeding::Lattice),
    )
    .run(&Layouts::new())
    .unwrap();
    save_submission(&path, &to_layouts(&seeded)).unwrap();

    let starts = load_submission(&path).unwrap();
    let improved = BatchRunner::new(
        BatchConfig::new()
            .with_max_n(4)
            .with_algorithm(Algorithm::Strict)
            .with_anneal(quick_anneal())
            .with_threads(1),
    )
    .run(&starts)
    .unwrap();

    for (before, after) in score_layouts(&starts).iter().zip(&improved) {
        assert!(after.valid);
        // Allows a spread that keeps the layout valid after rounding
        assert!(after.side <= before.side + 1e-5);
    }
}

#[test]
fn test_grid_ga_seeding_to_submission() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.csv");

    let results = BatchRunner::new(
        BatchConfig::new()
            .with_max_n(5)
            .with_algorithm(Algorithm::Strict)
            .with_seeding(Seeding::GridGa)
            .with_anneal(quick_anneal())
            .with_master_seed(3),
    )
    .run(&Layouts::new())
    .unwrap();
    assert!(results.iter().all(|r| r.valid));

    save_submission(&path, &to_layouts(&results)).unwrap();
    let loaded = load_submission(&path).unwrap();
    for (n, layout) in &loaded {
        assert_eq!(layout.len(), *n);
    }
    assert!(score_layouts(&loaded).iter().all(|r| r.valid));
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let config = quick_anneal().with_seed(77).with_overlap_penalty(3.5);

    for name in ["anneal.toml", "anneal.json"] {
        let path = dir.path().join(name);
        save_config(&config, &path).unwrap();
        assert_eq!(load_config(&path).unwrap(), config);
    }
}

#[test]
fn test_missing_files_report_io_errors() {
    let dir = tempdir().unwrap();
    assert!(matches!(
        load_config(dir.path().join("none.toml")),
        Err(ConfigError::Io(_))
    ));
    assert!(matches!(
        load_submission(dir.path().join("none.csv")),
        Err(SubmissionError::Io(_))
    ));
}
