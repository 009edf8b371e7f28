use std::path::PathBuf;

/// Errors raised by the fare pipeline.
///
/// Unknown categorical values are not represented here: the feature
/// transformer encodes them as an all-zero block instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum FareError {
    /// No fitted pipeline is loaded. Prediction requests are rejected.
    #[error("Model is not available ({reason}). Train the model first (model_builder train).")]
    ModelUnavailable { reason: String },

    /// The corpus cannot be used for training.
    #[error("data error: {0}")]
    DataError(#[from] DataErrorKind),

    /// A serving request failed input validation.
    #[error("malformed query: field `{field}` {reason}")]
    MalformedQuery { field: &'static str, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corpus CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("model artifact encoding error: {0}")]
    Artifact(#[from] bincode::Error),

    /// Training hyperparameters that cannot produce a model.
    #[error("invalid training parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("model artifact version {found} is not supported (expected {expected})")]
    IncompatibleArtifact { found: u32, expected: u32 },
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DataErrorKind {
    #[error("corpus file {} not found", .0.display())]
    MissingCorpus(PathBuf),

    #[error("corpus is empty")]
    EmptyCorpus,

    #[error("corpus is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {row}: {reason}")]
    InvalidRecord { row: usize, reason: String },

    #[error("cannot split {records} records with test fraction {test_fraction}")]
    InvalidSplit { records: usize, test_fraction: f64 },
}

impl FareError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedQuery {
            field,
            reason: reason.into(),
        }
    }

    /// True when the failure was caused by the caller's input rather than
    /// by the server's own state.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MalformedQuery { .. })
    }
}

pub type Result<T, E = FareError> = std::result::Result<T, E>;
