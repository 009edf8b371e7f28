use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FareError, Result};

pub const DEFAULT_DURATION: u32 = 180;
pub const DEFAULT_STOPS: u32 = 0;

/// One fare request, or the trip half of a stored offer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TripQuery {
    pub origin: String,
    pub destination: String,
    pub days_to_departure: u32,
    /// Empty when the carrier is unknown.
    pub airline: String,
    /// Minutes.
    pub duration: u32,
    pub stops: u32,
}

/// A priced offer in the corpus.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FareRecord {
    pub trip: TripQuery,
    /// Informational only, never a model feature.
    pub depart_date: Option<NaiveDate>,
    pub price: f64,
}

impl FareRecord {
    pub fn route_is(&self, origin: &str, destination: &str) -> bool {
        self.trip.origin == origin && self.trip.destination == destination
    }
}

/// A corpus offer annotated with its distance from a predicted price.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Recommendation {
    pub record: FareRecord,
    pub score: f64,
}

impl Recommendation {
    pub fn origin(&self) -> &str {
        &self.record.trip.origin
    }

    pub fn destination(&self) -> &str {
        &self.record.trip.destination
    }

    pub fn airline(&self) -> &str {
        &self.record.trip.airline
    }

    pub fn price(&self) -> f64 {
        self.record.price
    }

    pub fn stops(&self) -> u32 {
        self.record.trip.stops
    }

    pub fn duration(&self) -> u32 {
        self.record.trip.duration
    }

    pub fn depart_date(&self) -> Option<NaiveDate> {
        self.record.depart_date
    }
}

/// Serving input as it arrives from a form: every field is optional text.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub days_to_departure: Option<String>,
    pub airline: Option<String>,
    pub duration: Option<String>,
    pub stops: Option<String>,
}

impl RawQuery {
    /// Validates the form fields and applies the documented defaults
    /// (`airline` empty, `duration` 180, `stops` 0).
    pub fn parse(&self) -> Result<TripQuery> {
        let origin = required_text("origin", &self.origin)?;
        let destination = required_text("destination", &self.destination)?;
        if origin == destination {
            return Err(FareError::malformed(
                "destination",
                "must differ from origin",
            ));
        }

        let days_to_departure = match non_blank(&self.days_to_departure) {
            Some(raw) => parse_count("days_to_departure", raw)?,
            None => return Err(FareError::malformed("days_to_departure", "is required")),
        };
        let duration = match non_blank(&self.duration) {
            Some(raw) => parse_count("duration", raw)?,
            None => DEFAULT_DURATION,
        };
        if duration == 0 {
            return Err(FareError::malformed("duration", "must be positive"));
        }
        let stops = match non_blank(&self.stops) {
            Some(raw) => parse_count("stops", raw)?,
            None => DEFAULT_STOPS,
        };

        Ok(TripQuery {
            origin,
            destination,
            days_to_departure,
            airline: non_blank(&self.airline).unwrap_or_default().to_string(),
            duration,
            stops,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required_text(field: &'static str, value: &Option<String>) -> Result<String> {
    non_blank(value)
        .map(str::to_string)
        .ok_or_else(|| FareError::malformed(field, "is required"))
}

fn parse_count(field: &'static str, raw: &str) -> Result<u32> {
    raw.parse::<u32>().map_err(|_| {
        FareError::malformed(field, format!("must be a non-negative integer, got `{raw}`"))
    })
}
