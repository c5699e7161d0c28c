use serde::{Deserialize, Serialize};

/// One measured leaf sample. Coordinates in degrees, climate in the units of
/// the source table (°C, mm/yr, kg N/ha/yr, W/m²).
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Leaf nitrogen content, the regression target.
    pub leaf_n: f64,
    pub longitude: f64,
    pub latitude: f64,
    pub elevation: f64,
    /// Mean annual temperature.
    pub temperature: f64,
    /// Mean annual precipitation.
    pub precipitation: f64,
    pub n_deposition: f64,
    /// Mean annual irradiance.
    pub irradiance: f64,
    pub species: String,
}

/// Predictor columns available to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predictor {
    Longitude,
    Latitude,
    Elevation,
    Temperature,
    Precipitation,
    NDeposition,
    Irradiance,
    Species,
}

impl Predictor {
    pub const ALL: [Predictor; 8] = [
        Predictor::Longitude,
        Predictor::Latitude,
        Predictor::Elevation,
        Predictor::Temperature,
        Predictor::Precipitation,
        Predictor::NDeposition,
        Predictor::Irradiance,
        Predictor::Species,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Predictor::Longitude     => "longitude",
            Predictor::Latitude      => "latitude",
            Predictor::Elevation     => "elevation",
            Predictor::Temperature   => "temperature",
            Predictor::Precipitation => "precipitation",
            Predictor::NDeposition   => "n_deposition",
            Predictor::Irradiance    => "irradiance",
            Predictor::Species       => "species",
        }
    }
}

/// Cleaned, species-filtered observations. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    rows: Vec<Observation>,
    /// Sorted, de-duplicated species names; a species' code is its index here.
    species: Vec<String>,
}

impl ObservationTable {
    pub fn new(rows: Vec<Observation>) -> Self {
        let mut species: Vec<String> = rows.iter().map(|o| o.species.clone()).collect();
        species.sort();
        species.dedup();
        Self { rows, species }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn get(&self, index: usize) -> Option<&Observation> {
        self.rows.get(index)
    }

    pub fn species(&self) -> &[String] {
        &self.species
    }

    pub fn species_code(&self, name: &str) -> Option<u32> {
        self.species.binary_search_by(|s| s.as_str().cmp(name)).ok().map(|i| i as u32)
    }

    /// Value of `predictor` for one observation, species encoded as its code.
    pub fn value(&self, obs: &Observation, predictor: Predictor) -> f64 {
        match predictor {
            Predictor::Longitude     => obs.longitude,
            Predictor::Latitude      => obs.latitude,
            Predictor::Elevation     => obs.elevation,
            Predictor::Temperature   => obs.temperature,
            Predictor::Precipitation => obs.precipitation,
            Predictor::NDeposition   => obs.n_deposition,
            Predictor::Irradiance    => obs.irradiance,
            Predictor::Species => self
                .species_code(&obs.species)
                .map(f64::from)
                .unwrap_or(f64::NAN),
        }
    }

    /// Whole-table column for one predictor.
    pub fn column(&self, predictor: Predictor) -> Vec<f64> {
        self.rows.iter().map(|o| self.value(o, predictor)).collect()
    }

    pub fn target(&self) -> Vec<f64> {
        self.rows.iter().map(|o| o.leaf_n).collect()
    }

    /// Predictor rows and target vector restricted to `indices`, in that order.
    /// Indices must be in range; callers validate them first.
    pub fn design(&self, predictors: &[Predictor], indices: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        let x = indices
            .iter()
            .map(|&i| predictors.iter().map(|&p| self.value(&self.rows[i], p)).collect())
            .collect();
        let target = indices.iter().map(|&i| self.rows[i].leaf_n).collect();
        (x, target)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn obs(lon: f64, lat: f64, leaf_n: f64, species: &str) -> Observation {
        Observation {
            leaf_n,
            longitude: lon,
            latitude: lat,
            elevation: 100.0,
            temperature: 12.0,
            precipitation: 800.0,
            n_deposition: 5.0,
            irradiance: 150.0,
            species: species.to_string(),
        }
    }

    #[test]
    fn species_codes_follow_sorted_vocabulary() {
        let table = ObservationTable::new(vec![
            obs(0.0, 0.0, 1.0, "Quercus robur"),
            obs(1.0, 1.0, 2.0, "Acer rubrum"),
            obs(2.0, 2.0, 3.0, "Quercus robur"),
        ]);
        assert_eq!(table.species(), &["Acer rubrum".to_string(), "Quercus robur".to_string()]);
        assert_eq!(table.species_code("Quercus robur"), Some(1));
        assert_eq!(table.species_code("Pinus sylvestris"), None);
        assert_eq!(table.column(Predictor::Species), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn design_selects_rows_in_order() {
        let table = ObservationTable::new(vec![
            obs(10.0, 1.0, 1.5, "a"),
            obs(20.0, 2.0, 2.5, "b"),
            obs(30.0, 3.0, 3.5, "a"),
        ]);
        let (x, y) = table.design(&[Predictor::Longitude, Predictor::Species], &[2, 0]);
        assert_eq!(x, vec![vec![30.0, 0.0], vec![10.0, 0.0]]);
        assert_eq!(y, vec![3.5, 1.5]);
    }

    #[test]
    fn predictor_names_round_trip_through_serde() {
        let json = serde_json::to_string(&Predictor::NDeposition).unwrap();
        assert_eq!(json, "\"n_deposition\"");
        let back: Predictor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Predictor::NDeposition);
    }
}
