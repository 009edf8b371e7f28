//! Fit-once feature encoding for trip queries.
//!
//! Layout of every feature vector, fixed at fit time:
//! `[days_to_departure, duration, stops | origin one-hot | destination one-hot | airline one-hot]`.

use std::collections::BTreeSet;
use std::ops::Range;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::record::{FareRecord, TripQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    DaysToDeparture,
    Duration,
    Stops,
}

impl NumericField {
    pub const ALL: [NumericField; 3] = [Self::DaysToDeparture, Self::Duration, Self::Stops];

    fn read(self, trip: &TripQuery) -> f64 {
        match self {
            Self::DaysToDeparture => trip.days_to_departure as f64,
            Self::Duration => trip.duration as f64,
            Self::Stops => trip.stops as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoricalField {
    Origin,
    Destination,
    Airline,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 3] = [Self::Origin, Self::Destination, Self::Airline];

    fn read(self, trip: &TripQuery) -> &str {
        match self {
            Self::Origin => &trip.origin,
            Self::Destination => &trip.destination,
            Self::Airline => &trip.airline,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Mean and population standard deviation of one numeric field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScaleStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ScaleStats {
    fn fit(values: impl Iterator<Item = f64> + Clone) -> Self {
        let n = values.clone().count();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: 0.0,
            };
        }
        let mean = values.clone().sum::<f64>() / n as f64;
        let variance = values.map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        Self {
            mean,
            std_dev: variance.sqrt(),
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        if self.std_dev > 0.0 {
            (value - self.mean) / self.std_dev
        } else {
            0.0
        }
    }
}

/// Learned state of the transformer. Immutable once fitted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TransformerState {
    scales: [ScaleStats; 3],
    /// Sorted vocabulary per categorical field, in `CategoricalField::ALL` order.
    vocabularies: [Vec<String>; 3],
}

/// Encoded trip, laid out as described in the module docs.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(DVector<f64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        self.0.as_slice()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }
}

impl TransformerState {
    pub fn fit(records: &[FareRecord]) -> Self {
        let scales = NumericField::ALL.map(|field| {
            ScaleStats::fit(records.iter().map(move |r| field.read(&r.trip)))
        });
        let vocabularies = CategoricalField::ALL.map(|field| {
            records
                .iter()
                .map(|r| field.read(&r.trip).to_string())
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect::<Vec<_>>()
        });
        Self {
            scales,
            vocabularies,
        }
    }

    pub fn width(&self) -> usize {
        NumericField::ALL.len() + self.vocabularies.iter().map(Vec::len).sum::<usize>()
    }

    pub fn scale(&self, field: NumericField) -> ScaleStats {
        self.scales[field as usize]
    }

    pub fn vocabulary(&self, field: CategoricalField) -> &[String] {
        &self.vocabularies[field.index()]
    }

    /// Positions of a categorical field's indicator block.
    pub fn block(&self, field: CategoricalField) -> Range<usize> {
        let start = NumericField::ALL.len()
            + self.vocabularies[..field.index()]
                .iter()
                .map(Vec::len)
                .sum::<usize>();
        start..start + self.vocabularies[field.index()].len()
    }

    /// Encodes a trip. Categories absent from the fitted vocabulary leave
    /// their block all zero.
    pub fn transform(&self, trip: &TripQuery) -> FeatureVector {
        let mut features = DVector::zeros(self.width());
        for (i, field) in NumericField::ALL.into_iter().enumerate() {
            features[i] = self.scales[i].apply(field.read(trip));
        }
        for field in CategoricalField::ALL {
            let vocabulary = &self.vocabularies[field.index()];
            if let Ok(pos) = vocabulary.binary_search_by(|v| v.as_str().cmp(field.read(trip))) {
                features[self.block(field).start + pos] = 1.0;
            }
        }
        FeatureVector(features)
    }

    /// Design matrix with one transformed record per row.
    pub fn transform_all(&self, records: &[FareRecord]) -> DMatrix<f64> {
        let mut matrix = DMatrix::zeros(records.len(), self.width());
        for (row, record) in records.iter().enumerate() {
            let features = self.transform(&record.trip);
            matrix.set_row(row, &features.0.transpose());
        }
        matrix
    }
}
