//! Process-wide serving state.
//!
//! The corpus and the fitted pipeline are loaded once by
//! [`FareService::initialize`]. A missing or unreadable artifact leaves the
//! service in degraded mode: quotes fail with `ModelUnavailable` while the
//! corpus-backed lookups keep working.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::config::ServeConfig;
use crate::corpus::Corpus;
use crate::error::{FareError, Result};
use crate::pipeline::FittedPipeline;
use crate::record::{Recommendation, TripQuery};
use crate::recommend::recommend;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    Ready,
    Unavailable { reason: String },
}

/// Serving output: the estimate plus the cheapest offers on the route.
#[derive(Serialize, Debug, Clone)]
pub struct Quote {
    /// Rounded to cents.
    pub predicted_price: f64,
    pub recommendations: Vec<Recommendation>,
}

pub struct FareService {
    model_path: PathBuf,
    top_k: usize,
    corpus: Arc<Corpus>,
    /// Wait-free reads on the quote path; `reload` swaps the whole `Arc`.
    pipeline: ArcSwapOption<FittedPipeline>,
    /// Why the startup load failed. Only reported while `pipeline` is empty.
    unavailable_reason: String,
}

impl FareService {
    /// Loads the corpus and attempts to load the model. Only a corrupt
    /// corpus file is fatal; a missing model is recorded as degraded mode.
    pub fn initialize(config: &ServeConfig) -> Result<Self> {
        let corpus = Corpus::load_or_empty(&config.data_path)?;
        let (pipeline, unavailable_reason) = match load_pipeline(&config.model_path) {
            Ok(pipeline) => (Some(pipeline), String::new()),
            Err(reason) => (None, reason),
        };
        Ok(Self {
            model_path: config.model_path.clone(),
            top_k: config.top_k,
            corpus: Arc::new(corpus),
            pipeline: ArcSwapOption::new(pipeline),
            unavailable_reason,
        })
    }

    /// Builds a service from already loaded parts. `None` means degraded mode.
    pub fn from_parts(
        corpus: Corpus,
        pipeline: Option<FittedPipeline>,
        config: &ServeConfig,
    ) -> Self {
        Self {
            model_path: config.model_path.clone(),
            top_k: config.top_k,
            corpus: Arc::new(corpus),
            pipeline: ArcSwapOption::from_pointee(pipeline),
            unavailable_reason: String::from("no model artifact loaded"),
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn status(&self) -> ModelStatus {
        if self.pipeline.load().is_some() {
            ModelStatus::Ready
        } else {
            ModelStatus::Unavailable {
                reason: self.unavailable_reason.clone(),
            }
        }
    }

    /// The ready pipeline, or `ModelUnavailable`.
    pub fn pipeline(&self) -> Result<Arc<FittedPipeline>> {
        self.pipeline
            .load_full()
            .ok_or_else(|| FareError::ModelUnavailable {
                reason: self.unavailable_reason.clone(),
            })
    }

    /// Reloads the artifact from the configured path and swaps it in.
    /// On failure the current pipeline, if any, stays in service.
    pub fn reload(&self) -> Result<()> {
        let fresh = FittedPipeline::load(&self.model_path)?;
        self.pipeline.store(Some(Arc::new(fresh)));
        tracing::info!(path = %self.model_path.display(), "swapped in reloaded model");
        Ok(())
    }

    /// Predicts a fare and ranks matching offers. The corpus is not touched
    /// unless a pipeline is loaded.
    pub fn quote(&self, query: &TripQuery) -> Result<Quote> {
        let pipeline = self.pipeline()?;
        let predicted = pipeline.predict(query);
        let recommendations = recommend(
            &self.corpus,
            &query.origin,
            &query.destination,
            predicted,
            self.top_k,
        );
        tracing::debug!(
            origin = %query.origin,
            destination = %query.destination,
            predicted,
            offers = recommendations.len(),
            "quoted fare"
        );
        Ok(Quote {
            predicted_price: (predicted * 100.0).round() / 100.0,
            recommendations,
        })
    }
}

fn load_pipeline(path: &Path) -> Result<Arc<FittedPipeline>, String> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "model not found, predictions disabled");
        return Err(format!("no model artifact at {}", path.display()));
    }
    FittedPipeline::load(path).map(Arc::new).map_err(|err| {
        tracing::error!(path = %path.display(), error = %err, "failed to load model, predictions disabled");
        err.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forest::ForestParams;
    use crate::record::FareRecord;

    fn record(destination: &str, price: f64) -> FareRecord {
        FareRecord {
            trip: TripQuery {
                origin: "JFK".into(),
                destination: destination.into(),
                days_to_departure: 10,
                airline: "Delta".into(),
                duration: 300,
                stops: 0,
            },
            depart_date: None,
            price,
        }
    }

    fn config(dir: &Path) -> ServeConfig {
        ServeConfig {
            model_path: dir.join("model.bin"),
            data_path: dir.join("flights.csv"),
            ..ServeConfig::default()
        }
    }

    #[test]
    fn test_initialize_without_artifacts_is_degraded() {
        let dir = tempfile::tempdir().unwrap();
        let service = FareService::initialize(&config(dir.path())).unwrap();
        assert!(service.corpus().is_empty());
        assert!(matches!(service.status(), ModelStatus::Unavailable { .. }));
        let err = service.quote(&record("LAX", 0.0).trip).unwrap_err();
        assert!(matches!(err, FareError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_reload_swaps_in_new_model() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let records = vec![record("LAX", 300.0), record("SFO", 150.0)];
        let service = FareService::from_parts(Corpus::new(records.clone()), None, &cfg);
        assert!(service.pipeline().is_err());

        // failed reload keeps degraded mode
        assert!(service.reload().is_err());
        assert!(service.pipeline().is_err());

        let params = ForestParams {
            n_trees: 3,
            ..ForestParams::default()
        };
        FittedPipeline::fit(&records, &params).save(&cfg.model_path).unwrap();
        service.reload().unwrap();
        assert_eq!(service.status(), ModelStatus::Ready);

        let held = service.pipeline().unwrap();
        service.reload().unwrap();
        // readers keep the pipeline they already hold
        assert!(!Arc::ptr_eq(&held, &service.pipeline().unwrap()));
        assert_eq!(*held, *service.pipeline().unwrap());
    }

    #[test]
    fn test_quotes_continue_across_concurrent_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let records = vec![record("LAX", 300.0), record("LAX", 200.0)];
        let params = ForestParams {
            n_trees: 2,
            ..ForestParams::default()
        };
        let pipeline = FittedPipeline::fit(&records, &params);
        pipeline.save(&cfg.model_path).unwrap();
        let service = FareService::from_parts(Corpus::new(records.clone()), Some(pipeline), &cfg);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..5 {
                    service.reload().unwrap();
                }
            });
            for _ in 0..50 {
                let quote = service.quote(&records[0].trip).unwrap();
                assert_eq!(quote.recommendations.len(), 2);
            }
        });
        assert_eq!(service.status(), ModelStatus::Ready);
    }

    #[test]
    fn test_quote_rounds_prediction() {
        let records = vec![record("LAX", 300.0), record("LAX", 100.0 / 3.0)];
        let pipeline = FittedPipeline::fit(
            &records,
            &ForestParams {
                n_trees: 4,
                ..ForestParams::default()
            },
        );
        let service = FareService::from_parts(
            Corpus::new(records.clone()),
            Some(pipeline),
            &ServeConfig::default(),
        );
        let quote = service.quote(&records[0].trip).unwrap();
        let cents = quote.predicted_price * 100.0;
        assert!((cents - cents.round()).abs() < 1e-6);
        assert_eq!(quote.recommendations.len(), 2);
    }
}
