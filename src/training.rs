use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

use crate::corpus::Corpus;
use crate::error::{DataErrorKind, Result};
use crate::forest::ForestParams;
use crate::pipeline::FittedPipeline;
use crate::record::FareRecord;

pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub test_fraction: f64,
    /// Drives both the train/test split and the forest.
    pub seed: u64,
    pub forest: ForestParams,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            forest: ForestParams::default(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub mae: f64,
    pub rmse: f64,
    pub train_rows: usize,
    pub test_rows: usize,
}

/// Disjoint train/test partition of a corpus.
pub struct Split<'a> {
    pub train: Vec<&'a FareRecord>,
    pub test: Vec<&'a FareRecord>,
}

/// Shuffles row indices with `seed` and holds out `ceil(n * test_fraction)`
/// rows for testing.
pub fn split<'a>(records: &'a [FareRecord], test_fraction: f64, seed: u64) -> Result<Split<'a>> {
    let n = records.len();
    if n == 0 {
        return Err(DataErrorKind::EmptyCorpus.into());
    }
    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if !(test_fraction > 0.0 && test_fraction < 1.0) || n_test >= n {
        return Err(DataErrorKind::InvalidSplit {
            records: n,
            test_fraction,
        }
        .into());
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(seed));
    let (test_idx, train_idx) = indices.split_at(n_test);
    Ok(Split {
        train: train_idx.iter().map(|&i| &records[i]).collect(),
        test: test_idx.iter().map(|&i| &records[i]).collect(),
    })
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    debug_assert_eq!(actual.len(), predicted.len());
    if actual.is_empty() {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    mse.sqrt()
}

/// Loads the corpus at `path` and trains on it. A missing file is a data
/// error for this run, not an I/O fault.
pub fn train_from_csv(path: &Path, config: &TrainConfig) -> Result<(FittedPipeline, Metrics)> {
    if !path.exists() {
        return Err(DataErrorKind::MissingCorpus(path.to_path_buf()).into());
    }
    let corpus = Corpus::load(path)?;
    train(&corpus, config)
}

/// Splits, fits on the training rows only and scores the held-out rows.
pub fn train(corpus: &Corpus, config: &TrainConfig) -> Result<(FittedPipeline, Metrics)> {
    config.forest.validate()?;
    let Split { train, test } = split(corpus.records(), config.test_fraction, config.seed)?;
    tracing::info!(train = train.len(), test = test.len(), "split corpus");

    let train_records: Vec<FareRecord> = train.into_iter().cloned().collect();
    let forest = ForestParams {
        seed: config.seed,
        ..config.forest.clone()
    };
    let pipeline = FittedPipeline::fit(&train_records, &forest);

    let actual: Vec<f64> = test.iter().map(|r| r.price).collect();
    let predicted: Vec<f64> = test.iter().map(|r| pipeline.predict(&r.trip)).collect();
    let metrics = Metrics {
        mae: mean_absolute_error(&actual, &predicted),
        rmse: root_mean_squared_error(&actual, &predicted),
        train_rows: train_records.len(),
        test_rows: test.len(),
    };
    tracing::info!(mae = metrics.mae, rmse = metrics.rmse, "evaluated model");
    Ok((pipeline, metrics))
}
