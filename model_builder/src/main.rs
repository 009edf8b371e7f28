use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use farecast::config::{DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};
use farecast::forest::{ForestParams, MaxFeatures};
use farecast::logging::{init_subscriber, LogTarget, Verbosity};
use farecast::simulator::{FareSimulator, SimulatorConfig};
use farecast::training::{train_from_csv, TrainConfig, DEFAULT_SEED, DEFAULT_TEST_FRACTION};

#[derive(Parser, Debug)]
#[command(name = "model_builder", about = "Generate synthetic fares and train the fare model")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a synthetic fare corpus.
    Generate {
        #[arg(long, default_value = DEFAULT_DATA_PATH)]
        out: PathBuf,
        /// Number of records.
        #[arg(short, long, default_value_t = 5000)]
        n: usize,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Fit the pipeline on a corpus, report MAE/RMSE and save the artifact.
    Train {
        #[arg(long, default_value = DEFAULT_DATA_PATH)]
        data: PathBuf,
        #[arg(long, default_value = DEFAULT_MODEL_PATH)]
        out: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TEST_FRACTION)]
        test_fraction: f64,
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
        #[arg(long, default_value_t = 100)]
        trees: usize,
        #[arg(long)]
        max_depth: Option<usize>,
        /// Fraction of features considered per split.
        #[arg(long, default_value_t = 1.0 / 3.0)]
        max_features: f64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet), &LogTarget::Stderr)?;

    match cli.command {
        Command::Generate { out, n, seed } => {
            let config = SimulatorConfig {
                seed: seed.unwrap_or_else(rand::random),
                reference_date: chrono::Utc::now().date_naive(),
            };
            let corpus = FareSimulator::new(&config).generate(n);
            corpus
                .save(&out)
                .with_context(|| format!("writing corpus to {}", out.display()))?;
            println!("Wrote {} rows to {}", corpus.len(), out.display());
        }
        Command::Train {
            data,
            out,
            test_fraction,
            seed,
            trees,
            max_depth,
            max_features,
        } => {
            let config = TrainConfig {
                test_fraction,
                seed,
                forest: ForestParams {
                    n_trees: trees,
                    max_depth,
                    max_features: MaxFeatures::Fraction(max_features),
                    ..ForestParams::default()
                },
            };
            let (pipeline, metrics) = train_from_csv(&data, &config)
                .with_context(|| format!("training on {}", data.display()))?;

            println!("MAE: {:.4}", metrics.mae);
            println!("RMSE: {:.4}", metrics.rmse);
            println!(
                "Trained on {} rows, evaluated on {}",
                metrics.train_rows, metrics.test_rows
            );

            pipeline
                .save(&out)
                .with_context(|| format!("saving model to {}", out.display()))?;
            println!("Model saved to {}", out.display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_defaults_match_library() {
        let cli = Cli::parse_from(["model_builder", "train"]);
        match cli.command {
            Command::Train {
                data,
                out,
                test_fraction,
                seed,
                trees,
                max_depth,
                ..
            } => {
                assert_eq!(data, PathBuf::from("data/flights.csv"));
                assert_eq!(out, PathBuf::from("model/model.bin"));
                assert!((test_fraction - 0.2).abs() < 1e-12);
                assert_eq!(seed, 42);
                assert_eq!(trees, 100);
                assert_eq!(max_depth, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_generate_accepts_count_and_seed() {
        let cli = Cli::parse_from(["model_builder", "-q", "generate", "--out", "x.csv", "-n", "12", "--seed", "5"]);
        assert!(cli.quiet);
        match cli.command {
            Command::Generate { out, n, seed } => {
                assert_eq!(out, PathBuf::from("x.csv"));
                assert_eq!(n, 12);
                assert_eq!(seed, Some(5));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
