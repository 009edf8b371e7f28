use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DataErrorKind, FareError, Result};
use crate::record::{FareRecord, TripQuery};

/// Column names of the corpus file, in the order they are written.
pub const COLUMNS: [&str; 8] = [
    "origin",
    "destination",
    "depart_date",
    "days_to_departure",
    "airline",
    "duration",
    "stops",
    "price",
];

const FALLBACK_AIRPORTS: [&str; 4] = ["JFK", "LAX", "SFO", "ORD"];
const FALLBACK_AIRLINES: [&str; 2] = ["Delta", "United"];

/// Flat row layout of the corpus file.
#[derive(Serialize, Deserialize)]
struct CsvRow {
    origin: String,
    destination: String,
    depart_date: Option<NaiveDate>,
    days_to_departure: u32,
    airline: String,
    duration: u32,
    stops: u32,
    price: f64,
}

impl From<&FareRecord> for CsvRow {
    fn from(record: &FareRecord) -> Self {
        let trip = &record.trip;
        CsvRow {
            origin: trip.origin.clone(),
            destination: trip.destination.clone(),
            depart_date: record.depart_date,
            days_to_departure: trip.days_to_departure,
            airline: trip.airline.clone(),
            duration: trip.duration,
            stops: trip.stops,
            price: record.price,
        }
    }
}

impl From<CsvRow> for FareRecord {
    fn from(row: CsvRow) -> Self {
        FareRecord {
            trip: TripQuery {
                origin: row.origin,
                destination: row.destination,
                days_to_departure: row.days_to_departure,
                airline: row.airline,
                duration: row.duration,
                stops: row.stops,
            },
            depart_date: row.depart_date,
            price: row.price,
        }
    }
}

/// The ordered, read-only table of fare records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Corpus {
    records: Vec<FareRecord>,
}

impl Corpus {
    pub fn new(records: Vec<FareRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[FareRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Reads a corpus from CSV. Columns are matched by header name, so
    /// their order in the file does not matter.
    pub fn read_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        let missing: Vec<String> = COLUMNS
            .iter()
            .filter(|column| !headers.iter().any(|h| h == **column))
            .map(|column| column.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DataErrorKind::MissingColumns(missing).into());
        }

        let mut records = Vec::new();
        for (index, result) in rdr.deserialize::<CsvRow>().enumerate() {
            // Header is line 1.
            let row = index + 2;
            let record = FareRecord::from(result?);
            validate(&record, row)?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FareError::io(path, e))?;
        let corpus = Self::read_csv(file)?;
        tracing::info!(path = %path.display(), records = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    /// Loads the corpus for serving. A missing file yields an empty corpus
    /// so the process can still start.
    pub fn load_or_empty(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "corpus not found, serving without offers");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        for record in &self.records {
            wtr.serialize(CsvRow::from(record))?;
        }
        if self.records.is_empty() {
            wtr.write_record(COLUMNS)?;
        }
        wtr.flush().map_err(|e| FareError::io("<corpus writer>", e))?;
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FareError::io(parent, e))?;
        }
        let file = File::create(path).map_err(|e| FareError::io(path, e))?;
        self.write_csv(file)?;
        tracing::info!(path = %path.display(), records = self.len(), "wrote corpus");
        Ok(())
    }

    /// Sorted airport codes seen as origin or destination.
    pub fn airports(&self) -> Vec<String> {
        if self.is_empty() {
            return FALLBACK_AIRPORTS.iter().map(|s| s.to_string()).collect();
        }
        let codes: BTreeSet<&str> = self
            .records
            .iter()
            .flat_map(|r| [r.trip.origin.as_str(), r.trip.destination.as_str()])
            .collect();
        codes.into_iter().map(str::to_string).collect()
    }

    /// Sorted carriers seen in the corpus.
    pub fn airlines(&self) -> Vec<String> {
        if self.is_empty() {
            return FALLBACK_AIRLINES.iter().map(|s| s.to_string()).collect();
        }
        let carriers: BTreeSet<&str> = self
            .records
            .iter()
            .map(|r| r.trip.airline.as_str())
            .collect();
        carriers.into_iter().map(str::to_string).collect()
    }
}

impl FromIterator<FareRecord> for Corpus {
    fn from_iter<I: IntoIterator<Item = FareRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn validate(record: &FareRecord, row: usize) -> Result<()> {
    let invalid = |reason: &str| -> FareError {
        DataErrorKind::InvalidRecord {
            row,
            reason: reason.to_string(),
        }
        .into()
    };
    if record.trip.origin.is_empty() || record.trip.destination.is_empty() {
        return Err(invalid("origin and destination are required"));
    }
    if record.trip.duration == 0 {
        return Err(invalid("duration must be positive"));
    }
    if !record.price.is_finite() || record.price < 0.0 {
        return Err(invalid("price must be a non-negative number"));
    }
    Ok(())
}
