//! Synthetic fare generator.
//!
//! Every record is drawn independently and priced by a closed-form model
//! with a seasonal term, an urgency term, a per-stop discount, a carrier
//! bias and Gaussian noise. The downstream regressor is expected to
//! approximate this function.

use std::f64::consts::PI;

use chrono::{Days, NaiveDate};
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use crate::corpus::Corpus;
use crate::record::{FareRecord, TripQuery};

/// Canonical airport ordering. The index distance between two airports
/// stands in for flight distance.
pub const AIRPORTS: [&str; 10] = [
    "JFK", "LAX", "SFO", "ORD", "ATL", "MIA", "SEA", "BOS", "DEN", "LAS",
];
pub const AIRLINES: [&str; 6] = ["Delta", "United", "American", "Spirit", "JetBlue", "Southwest"];

pub const BUDGET_CARRIER: &str = "Spirit";
pub const PREMIUM_CARRIER: &str = "Delta";

pub const PRICE_FLOOR: f64 = 20.0;
const NOISE_STD_DEV: f64 = 25.0;
const STOP_WEIGHTS: [f64; 3] = [0.6, 0.3, 0.1];
const MAX_DAYS_TO_DEPARTURE: u32 = 120;
const DURATION_RANGE: (u32, u32) = (60, 720);
const DEPART_DATE_RANGE: (u64, u64) = (1, 120);

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub seed: u64,
    /// Departure dates are drawn relative to this day.
    pub reference_date: NaiveDate,
}

/// Noise-free inputs of the pricing function, exposed so the shape of the
/// model can be checked without sampling.
#[derive(Debug, Clone, Copy)]
pub struct PriceDrivers {
    pub base_distance: u32,
    pub duration: u32,
    pub month: u32,
    pub days_to_departure: u32,
    pub stops: u32,
}

impl PriceDrivers {
    pub fn base_price(&self) -> f64 {
        50.0 + 40.0 * self.base_distance as f64 + 0.1 * self.duration as f64
    }

    /// Seasonal multiplier in [0.9, 1.1].
    pub fn month_factor(&self) -> f64 {
        1.0 + 0.1 * (2.0 * PI * self.month as f64 / 12.0).sin()
    }

    /// Flat beyond 30 days out, rising 2% per day closer than that.
    pub fn urgency(&self) -> f64 {
        1.0 + 0.02 * 30u32.saturating_sub(self.days_to_departure) as f64
    }

    pub fn stops_penalty(&self) -> f64 {
        1.0 - 0.1 * self.stops as f64
    }

    /// Price before carrier bias and noise.
    pub fn expected_price(&self) -> f64 {
        self.base_price() * self.month_factor() * self.urgency() * self.stops_penalty()
    }
}

pub fn carrier_bias(airline: &str) -> f64 {
    match airline {
        BUDGET_CARRIER => 0.8,
        PREMIUM_CARRIER => 1.05,
        _ => 1.0,
    }
}

pub fn airport_position(code: &str) -> Option<usize> {
    AIRPORTS.iter().position(|a| *a == code)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct FareSimulator {
    rng: StdRng,
    reference_date: NaiveDate,
    stops: WeightedIndex<f64>,
    noise: Normal<f64>,
}

impl FareSimulator {
    pub fn new(config: &SimulatorConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            reference_date: config.reference_date,
            stops: WeightedIndex::new(STOP_WEIGHTS).expect("stop weights are positive"),
            noise: Normal::new(0.0, NOISE_STD_DEV).expect("noise std dev is finite"),
        }
    }

    pub fn generate(&mut self, count: usize) -> Corpus {
        let corpus: Corpus = (0..count).map(|_| self.next_record()).collect();
        tracing::info!(records = corpus.len(), "generated synthetic fares");
        corpus
    }

    pub fn next_record(&mut self) -> FareRecord {
        let origin_idx = self.rng.random_range(0..AIRPORTS.len());
        let mut dest_idx = self.rng.random_range(0..AIRPORTS.len() - 1);
        if dest_idx >= origin_idx {
            dest_idx += 1;
        }

        let offset = self
            .rng
            .random_range(DEPART_DATE_RANGE.0..=DEPART_DATE_RANGE.1);
        let depart_date = self.reference_date.checked_add_days(Days::new(offset));
        let days_to_departure = self.rng.random_range(0..=MAX_DAYS_TO_DEPARTURE);
        let airline = AIRLINES[self.rng.random_range(0..AIRLINES.len())];
        let duration = self.rng.random_range(DURATION_RANGE.0..=DURATION_RANGE.1);
        let stops = self.stops.sample(&mut self.rng) as u32;
        let month = self.rng.random_range(1..=12);

        let drivers = PriceDrivers {
            base_distance: origin_idx.abs_diff(dest_idx) as u32,
            duration,
            month,
            days_to_departure,
            stops,
        };
        let noise = self.noise.sample(&mut self.rng);
        let price = (drivers.expected_price() * carrier_bias(airline) + noise).max(PRICE_FLOOR);

        FareRecord {
            trip: TripQuery {
                origin: AIRPORTS[origin_idx].to_string(),
                destination: AIRPORTS[dest_idx].to_string(),
                days_to_departure,
                airline: airline.to_string(),
                duration,
                stops,
            },
            depart_date,
            price: round2(price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn config(seed: u64) -> SimulatorConfig {
        SimulatorConfig {
            seed,
            reference_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        }
    }

    fn drivers() -> PriceDrivers {
        PriceDrivers {
            base_distance: 2,
            duration: 200,
            month: 12,
            days_to_departure: 60,
            stops: 0,
        }
    }

    #[test]
    fn test_pricing_terms() {
        let d = drivers();
        assert!((d.base_price() - 150.0).abs() < 1e-9);
        // sin(2π) == 0
        assert!((d.month_factor() - 1.0).abs() < 1e-9);
        assert!((d.urgency() - 1.0).abs() < 1e-9);

        let urgent = PriceDrivers {
            days_to_departure: 0,
            ..d
        };
        assert!((urgent.urgency() - 1.6).abs() < 1e-9);

        let two_stops = PriceDrivers { stops: 2, ..d };
        assert!((two_stops.expected_price() - 120.0).abs() < 1e-9);

        let march = PriceDrivers { month: 3, ..d };
        assert!((march.month_factor() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_carrier_bias() {
        assert_eq!(carrier_bias("Spirit"), 0.8);
        assert_eq!(carrier_bias("Delta"), 1.05);
        assert_eq!(carrier_bias("United"), 1.0);
        assert_eq!(carrier_bias(""), 1.0);
    }

    #[test]
    fn test_same_seed_same_corpus() {
        let a = FareSimulator::new(&config(7)).generate(50);
        let b = FareSimulator::new(&config(7)).generate(50);
        assert_eq!(a, b);
        let c = FareSimulator::new(&config(8)).generate(50);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fields_stay_in_range() {
        let reference = config(1).reference_date;
        let corpus = FareSimulator::new(&config(1)).generate(2000);
        let mut stop_counts = [0usize; 3];
        for record in corpus.records() {
            let trip = &record.trip;
            assert!(airport_position(&trip.origin).is_some());
            assert!(AIRLINES.contains(&trip.airline.as_str()));
            assert!(trip.days_to_departure <= 120);
            assert!((60..=720).contains(&trip.duration));
            stop_counts[trip.stops as usize] += 1;
            let date = record.depart_date.unwrap();
            let offset = (date - reference).num_days();
            assert!((1..=120).contains(&offset));
            assert_eq!(record.price, (record.price * 100.0).round() / 100.0);
        }
        // nonstop dominates, two stops is rarest
        assert!(stop_counts[0] > stop_counts[1]);
        assert!(stop_counts[1] > stop_counts[2]);
    }

    proptest! {
        #[test]
        fn property_price_floor_and_distinct_route(seed in any::<u64>()) {
            let corpus = FareSimulator::new(&config(seed)).generate(200);
            prop_assert_eq!(corpus.len(), 200);
            for record in corpus.records() {
                prop_assert!(record.price >= PRICE_FLOOR);
                prop_assert_ne!(&record.trip.origin, &record.trip.destination);
            }
        }
    }
}
