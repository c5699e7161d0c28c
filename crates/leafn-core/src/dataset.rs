//! CSV ingestion and screening.
//!
//! Reading keeps every row with optional fields; screening then restricts to
//! the most frequent species and drops incomplete rows. Nothing downstream of
//! `screen` ever sees a missing value.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::observation::{Observation, ObservationTable};

/// CSV header names for each attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMap {
    pub leaf_n: String,
    pub longitude: String,
    pub latitude: String,
    pub elevation: String,
    pub temperature: String,
    pub precipitation: String,
    pub n_deposition: String,
    pub irradiance: String,
    pub species: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            leaf_n: "leaf_n".into(),
            longitude: "longitude".into(),
            latitude: "latitude".into(),
            elevation: "elevation".into(),
            temperature: "mat".into(),
            precipitation: "map".into(),
            n_deposition: "ndep".into(),
            irradiance: "irradiance".into(),
            species: "species".into(),
        }
    }
}

/// One CSV row before screening. `None` marks a missing cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    pub leaf_n: Option<f64>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub elevation: Option<f64>,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub n_deposition: Option<f64>,
    pub irradiance: Option<f64>,
    pub species: Option<String>,
}

impl RawRecord {
    /// The complete observation, or `None` if any field is missing.
    pub fn complete(&self) -> Option<Observation> {
        Some(Observation {
            leaf_n: self.leaf_n?,
            longitude: self.longitude?,
            latitude: self.latitude?,
            elevation: self.elevation?,
            temperature: self.temperature?,
            precipitation: self.precipitation?,
            n_deposition: self.n_deposition?,
            irradiance: self.irradiance?,
            species: self.species.clone()?,
        })
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        Some((self.longitude?, self.latitude?))
    }
}

fn is_missing(cell: &str) -> bool {
    let c = cell.trim();
    c.is_empty()
        || c.eq_ignore_ascii_case("na")
        || c.eq_ignore_ascii_case("nan")
        || c.eq_ignore_ascii_case("null")
}

/// Parse a CSV stream with a header row into raw records.
///
/// Missing cells (empty, `NA`, `NaN`, `NULL`) and infinite values become
/// `None`; any other cell that does not parse as a number is an error.
pub fn read_records<R: Read>(reader: R, columns: &ColumnMap) -> Result<Vec<RawRecord>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(false).from_reader(reader);
    let headers = rdr.headers()?.clone();
    let find = |name: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };

    let idx = [
        find(&columns.leaf_n)?,
        find(&columns.longitude)?,
        find(&columns.latitude)?,
        find(&columns.elevation)?,
        find(&columns.temperature)?,
        find(&columns.precipitation)?,
        find(&columns.n_deposition)?,
        find(&columns.irradiance)?,
    ];
    let species_idx = find(&columns.species)?;
    let names = [
        &columns.leaf_n,
        &columns.longitude,
        &columns.latitude,
        &columns.elevation,
        &columns.temperature,
        &columns.precipitation,
        &columns.n_deposition,
        &columns.irradiance,
    ];

    let mut out = Vec::new();
    for (row, record) in rdr.records().enumerate() {
        let record = record?;
        let mut values = [None; 8];
        for (slot, (&i, name)) in values.iter_mut().zip(idx.iter().zip(names)) {
            let cell = record.get(i).unwrap_or("");
            if is_missing(cell) {
                continue;
            }
            match cell.trim().parse::<f64>() {
                Ok(v) if v.is_finite() => *slot = Some(v),
                Ok(_) => {}
                Err(_) => {
                    return Err(Error::ParseValue {
                        // 1-based data row, header excluded
                        row: row + 1,
                        column: name.to_string(),
                        value: cell.to_string(),
                    })
                }
            }
        }
        let species = record
            .get(species_idx)
            .filter(|s| !is_missing(s))
            .map(|s| s.trim().to_string());

        out.push(RawRecord {
            leaf_n: values[0],
            longitude: values[1],
            latitude: values[2],
            elevation: values[3],
            temperature: values[4],
            precipitation: values[5],
            n_deposition: values[6],
            irradiance: values[7],
            species,
        });
    }
    debug!(rows = out.len(), "read CSV records");
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    OutsideTopSpecies,
    MissingValue,
}

#[derive(Debug, Clone)]
pub struct Excluded {
    pub reason: ExclusionReason,
    /// (longitude, latitude) when both were present.
    pub coordinates: Option<(f64, f64)>,
}

/// Outcome of species filtering and cleaning.
#[derive(Debug, Clone)]
pub struct Screening {
    pub table: ObservationTable,
    pub excluded: Vec<Excluded>,
    /// Retained species with their raw record counts, most frequent first.
    pub top_species: Vec<(String, usize)>,
    pub n_raw: usize,
}

impl Screening {
    pub fn count_excluded(&self, reason: ExclusionReason) -> usize {
        self.excluded.iter().filter(|e| e.reason == reason).count()
    }
}

/// The `n` most frequent species among `records`, ties broken by name.
pub fn most_frequent_species(records: &[RawRecord], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in records {
        if let Some(s) = r.species.as_deref() {
            *counts.entry(s).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, usize)> =
        counts.into_iter().map(|(s, c)| (s.to_string(), c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Keep records of the `top_species` most frequent species, then drop any
/// record with a missing value.
pub fn screen(records: Vec<RawRecord>, top_species: usize) -> Screening {
    let n_raw = records.len();
    let top = most_frequent_species(&records, top_species);
    let keep: HashSet<&str> = top.iter().map(|(s, _)| s.as_str()).collect();

    let mut rows = Vec::new();
    let mut excluded = Vec::new();
    for r in &records {
        let in_top = r.species.as_deref().is_some_and(|s| keep.contains(s));
        if !in_top {
            excluded.push(Excluded {
                reason: ExclusionReason::OutsideTopSpecies,
                coordinates: r.coordinates(),
            });
            continue;
        }
        match r.complete() {
            Some(obs) => rows.push(obs),
            None => excluded.push(Excluded {
                reason: ExclusionReason::MissingValue,
                coordinates: r.coordinates(),
            }),
        }
    }

    info!(
        raw = n_raw,
        kept = rows.len(),
        excluded = excluded.len(),
        species = top.len(),
        "screened observations"
    );
    Screening { table: ObservationTable::new(rows), excluded, top_species: top, n_raw }
}
