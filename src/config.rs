use std::path::PathBuf;

use crate::recommend::DEFAULT_TOP_K;

pub const DEFAULT_MODEL_PATH: &str = "model/model.bin";
pub const DEFAULT_DATA_PATH: &str = "data/flights.csv";

/// Environment variables read by the binaries as fallbacks for their flags.
pub const MODEL_PATH_ENV: &str = "FARECAST_MODEL_PATH";
pub const DATA_PATH_ENV: &str = "FARECAST_DATA_PATH";

/// Where the serving process finds its artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct ServeConfig {
    pub model_path: PathBuf,
    pub data_path: PathBuf,
    /// Maximum number of offers returned with a quote.
    pub top_k: usize,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            top_k: DEFAULT_TOP_K,
        }
    }
}
