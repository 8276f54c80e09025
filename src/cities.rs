use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct AirportRef {
    code: String,
    #[serde(default)]
    city_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CityRef {
    code: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CityNamesFile {
    #[serde(default)]
    airports: Vec<AirportRef>,
    #[serde(default)]
    cities: Vec<CityRef>,
}

/// Airport-code to city-display-name reference, joined once at load from
/// the two-hop airport->city-code->city-name table. Best-effort cosmetic
/// correction over raw source city names, nothing more.
pub struct CityNames {
    by_airport: HashMap<String, String>,
}

impl CityNames {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let file: CityNamesFile = serde_json::from_str(&contents)?;

        let city_names: HashMap<&str, &str> = file
            .cities
            .iter()
            .map(|c| (c.code.as_str(), c.name.as_str()))
            .collect();

        let mut by_airport = HashMap::new();
        for airport in &file.airports {
            if let Some(city_code) = &airport.city_code
                && let Some(name) = city_names.get(city_code.as_str())
            {
                by_airport.insert(airport.code.clone(), name.to_string());
            }
        }

        debug!("city-name reference resolves {} airports", by_airport.len());
        Ok(Self { by_airport })
    }

    pub fn resolve(&self, airport_code: &str) -> Option<&str> {
        self.by_airport.get(airport_code).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_two_hop_resolution() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(
            br#"{
                "airports": [
                    {"code": "LGA", "city_code": "NYC"},
                    {"code": "ORD", "city_code": "CHI"},
                    {"code": "ZZZ", "city_code": "MISSING"},
                    {"code": "NOC"}
                ],
                "cities": [
                    {"code": "NYC", "name": "New York"},
                    {"code": "CHI", "name": "Chicago"}
                ]
            }"#,
        )
        .expect("Failed to write reference file");

        let cities = CityNames::load(file.path()).expect("Failed to load reference");
        assert_eq!(cities.resolve("LGA"), Some("New York"));
        assert_eq!(cities.resolve("ORD"), Some("Chicago"));
        // Unknown city code or no city code at all: no resolution
        assert_eq!(cities.resolve("ZZZ"), None);
        assert_eq!(cities.resolve("NOC"), None);
        assert_eq!(cities.resolve("SEA"), None);
    }
}
