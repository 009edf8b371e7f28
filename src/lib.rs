//! Fare estimation and offer recommendation.
//!
//! `simulator` produces a synthetic corpus, `training` fits a
//! [`FittedPipeline`] (feature transformer plus tree ensemble) on it, and
//! `service` answers quotes by predicting a fare and ranking the corpus
//! offers on the same route.

pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod forest;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod recommend;
pub mod service;
pub mod simulator;
pub mod training;

pub use crate::corpus::Corpus;
pub use crate::error::{DataErrorKind, FareError};
pub use crate::pipeline::FittedPipeline;
pub use crate::record::{FareRecord, RawQuery, Recommendation, TripQuery};
pub use crate::service::{FareService, ModelStatus, Quote};
