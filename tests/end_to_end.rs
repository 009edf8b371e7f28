use chrono::NaiveDate;
use farecast::config::ServeConfig;
use farecast::features::CategoricalField;
use farecast::forest::ForestParams;
use farecast::simulator::{FareSimulator, SimulatorConfig};
use farecast::training::{train, TrainConfig};
use farecast::{Corpus, FareError, FareRecord, FareService, FittedPipeline, RawQuery, TripQuery};

fn record(origin: &str, destination: &str, price: f64) -> FareRecord {
    FareRecord {
        trip: TripQuery {
            origin: origin.into(),
            destination: destination.into(),
            days_to_departure: 21,
            airline: "United".into(),
            duration: 330,
            stops: 0,
        },
        depart_date: NaiveDate::from_ymd_opt(2025, 5, 4),
        price,
    }
}

fn synthetic(count: usize) -> Corpus {
    FareSimulator::new(&SimulatorConfig {
        seed: 11,
        reference_date: NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
    })
    .generate(count)
}

fn quick_config(seed: u64) -> TrainConfig {
    TrainConfig {
        seed,
        forest: ForestParams {
            n_trees: 15,
            ..ForestParams::default()
        },
        ..TrainConfig::default()
    }
}

#[test]
fn test_route_scenario_returns_only_matching_offer() {
    let corpus = Corpus::new(vec![record("JFK", "LAX", 300.0), record("JFK", "SFO", 150.0)]);
    let pipeline = FittedPipeline::fit(corpus.records(), &ForestParams::default());
    let service = FareService::from_parts(corpus, Some(pipeline.clone()), &ServeConfig::default());

    let query = RawQuery {
        origin: Some("JFK".into()),
        destination: Some("LAX".into()),
        days_to_departure: Some("21".into()),
        ..RawQuery::default()
    }
    .parse()
    .unwrap();
    let predicted = pipeline.predict(&query);
    let quote = service.quote(&query).unwrap();

    assert_eq!(quote.recommendations.len(), 1);
    let rec = &quote.recommendations[0];
    assert_eq!(rec.destination(), "LAX");
    assert_eq!(rec.price(), 300.0);
    assert!((rec.score - (300.0 - predicted).abs()).abs() < 1e-9);
    assert!((quote.predicted_price - predicted).abs() <= 0.005 + 1e-9);
}

#[test]
fn test_training_is_deterministic_per_seed() {
    let corpus = synthetic(400);
    let (first, m1) = train(&corpus, &quick_config(5)).unwrap();
    let (second, m2) = train(&corpus, &quick_config(5)).unwrap();
    assert_eq!(m1, m2);

    let query = record("SFO", "MIA", 0.0).trip;
    assert!((first.predict(&query) - second.predict(&query)).abs() < 1e-9);
}

#[test]
fn test_artifact_survives_serving_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServeConfig {
        model_path: dir.path().join("model").join("model.bin"),
        data_path: dir.path().join("data").join("flights.csv"),
        ..ServeConfig::default()
    };
    let corpus = synthetic(300);
    corpus.save(&config.data_path).unwrap();
    let (pipeline, _) = train(&corpus, &quick_config(1)).unwrap();
    pipeline.save(&config.model_path).unwrap();

    let service = FareService::initialize(&config).unwrap();
    assert_eq!(service.corpus().len(), 300);

    let sample = &corpus.records()[0];
    let quote = service.quote(&sample.trip).unwrap();
    assert!(!quote.recommendations.is_empty());
    assert!(quote.recommendations.len() <= config.top_k);
    assert!(quote
        .recommendations
        .iter()
        .all(|r| r.origin() == sample.trip.origin && r.destination() == sample.trip.destination));
    assert!(quote.recommendations.windows(2).all(|w| w[0].price() <= w[1].price()));
}

#[test]
fn test_degraded_mode_rejects_quotes() {
    let dir = tempfile::tempdir().unwrap();
    let config = ServeConfig {
        model_path: dir.path().join("missing.bin"),
        data_path: dir.path().join("flights.csv"),
        ..ServeConfig::default()
    };
    synthetic(50).save(&config.data_path).unwrap();

    let service = FareService::initialize(&config).unwrap();
    assert_eq!(service.corpus().len(), 50);
    let err = service.quote(&record("JFK", "LAX", 0.0).trip).unwrap_err();
    assert!(matches!(err, FareError::ModelUnavailable { .. }));
    assert!(!err.is_client_error());
}

#[test]
fn test_unseen_airline_is_encoded_as_zero_block() {
    let corpus = synthetic(200);
    let (pipeline, _) = train(&corpus, &quick_config(2)).unwrap();
    let mut trip = record("JFK", "LAX", 0.0).trip;
    trip.airline = "Concorde".into();

    let features = pipeline.features(&trip);
    let block = pipeline.transformer().block(CategoricalField::Airline);
    assert!(features.as_slice()[block].iter().all(|v| *v == 0.0));
    assert!(pipeline.predict(&trip) >= 0.0);
}
