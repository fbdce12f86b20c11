//! Tree packing CLI

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use treepack_core::AnnealConfig;
use treepack_runner::{
    load_config, load_submission, render_config, save_submission, score_layouts, to_layouts,
    total_score, Algorithm, BatchConfig, BatchRunner, ConfigFormat, Layouts,
};

#[derive(Parser)]
#[command(name = "treepack")]
#[command(about = "Packs n copies of a tree polygon into the smallest square")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve every layout from 1 to n trees
    Solve {
        /// Largest tree count
        #[arg(short, long, default_value = "200")]
        n: usize,

        /// Search algorithm
        #[arg(short, long, value_enum, default_value = "strict")]
        algorithm: AlgorithmArg,

        /// Initial layout heuristic
        #[arg(long, value_enum, default_value = "radial")]
        seeding: SeedingArg,

        /// Annealing config file (TOML or JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Master random seed
        #[arg(short, long, default_value = "42")]
        seed: u64,

        /// Submission CSV to start from
        #[arg(long)]
        start_from: Option<PathBuf>,

        /// Refinement sweeps after annealing (0 = none)
        #[arg(long, default_value = "0")]
        refine: usize,

        /// Time limit per layout in seconds (0 = unlimited)
        #[arg(short, long, default_value = "0")]
        time_limit: u64,

        /// Worker threads
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Output submission CSV
        #[arg(short, long, default_value = "submission.csv")]
        output: PathBuf,
    },

    /// Score an existing submission
    Score {
        /// Submission CSV
        file: PathBuf,

        /// Print every layout
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the default annealing config
    DefaultConfig {
        /// Output format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: FormatArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AlgorithmArg {
    /// Initial heuristic only
    Seed,
    /// Strict-validity annealing
    Strict,
    /// Soft-penalty annealing
    Penalty,
    /// Extended multi-kernel annealing
    Extended,
    /// Extended multi-kernel annealing with penalized acceptance
    ExtendedPenalty,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Seed => Algorithm::Seed,
            AlgorithmArg::Strict => Algorithm::Strict,
            AlgorithmArg::Penalty => Algorithm::Penalty,
            AlgorithmArg::Extended => Algorithm::Extended,
            AlgorithmArg::ExtendedPenalty => Algorithm::ExtendedPenalty,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SeedingArg {
    /// Greedy radial scanning
    Radial,
    /// Staggered rows
    Lattice,
    /// Block grid of interlocked pairs tuned by a genetic algorithm
    GridGa,
}

impl From<SeedingArg> for treepack_runner::Seeding {
    fn from(arg: SeedingArg) -> Self {
        match arg {
            SeedingArg::Radial => treepack_runner::Seeding::Radial,
            SeedingArg::Lattice => treepack_runner::Seeding::Lattice,
            SeedingArg::GridGa => treepack_runner::Seeding::GridGa,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Toml,
    Json,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Solve {
            n,
            algorithm,
            seeding,
            config,
            seed,
            start_from,
            refine,
            time_limit,
            threads,
            output,
        } => {
            let anneal = match &config {
                Some(path) => load_config(path)?,
                None => AnnealConfig::default(),
            }
            .with_time_limit_ms(time_limit * 1000);

            let starts = match &start_from {
                Some(path) => {
                    let layouts = load_submission(path)?;
                    println!("Loaded {} starting layouts from {}", layouts.len(), path.display());
                    layouts
                }
                None => Layouts::new(),
            };

            let mut batch = BatchConfig::new()
                .with_max_n(n)
                .with_algorithm(algorithm.into())
                .with_seeding(seeding.into())
                .with_anneal(anneal)
                .with_master_seed(seed)
                .with_refine_iters(refine);
            if let Some(t) = threads {
                batch = batch.with_threads(t);
            }

            let results = BatchRunner::new(batch).run(&starts)?;
            let invalid = results.iter().filter(|r| !r.valid).count();

            save_submission(&output, &to_layouts(&results))?;
            println!("Total score: {:.6}", total_score(&results));
            if invalid > 0 {
                println!("Warning: {} layouts still collide", invalid);
            }
            println!("Submission saved to: {}", output.display());
        }

        Commands::Score { file, verbose } => {
            let layouts = load_submission(&file)?;
            let results = score_layouts(&layouts);

            if verbose {
                println!("{:>5} {:>12} {:>12} {:>7}", "n", "side", "score", "valid");
                println!("{:-<40}", "");
                for r in &results {
                    println!("{:>5} {:>12.6} {:>12.6} {:>7}", r.n, r.side, r.score, r.valid);
                }
            }

            let invalid: Vec<usize> = results.iter().filter(|r| !r.valid).map(|r| r.n).collect();
            println!("Layouts: {}", results.len());
            println!("Total score: {:.6}", total_score(&results));
            if !invalid.is_empty() {
                anyhow::bail!("{} layouts collide: {:?}", invalid.len(), invalid);
            }
        }

        Commands::DefaultConfig { format } => {
            let format = match format {
                FormatArg::Toml => ConfigFormat::Toml,
                FormatArg::Json => ConfigFormat::Json,
            };
            println!("{}", render_config(&AnnealConfig::default(), format)?);
        }
    }

    Ok(())
}
