use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::MacConfig;
use crate::error::{Error, Result};

/// Grouping metadata for one multi-airport city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacCity {
    pub code: String,
    pub name: String,
    #[serde(
        rename = "countryName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub country_name: Option<String>,
}

/// Mapping from individual airport codes to their multi-airport-city
/// grouping code, plus the grouping metadata list. Loaded once per pipeline
/// run and read-only afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MacOverlay {
    #[serde(default)]
    pub airports: Vec<MacCity>,
    #[serde(default)]
    pub map: HashMap<String, String>,
}

impl MacOverlay {
    /// A missing or corrupt overlay file is fatal at pipeline start: without
    /// it macCode attachment can't be decided safely.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OverlayLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&contents).map_err(|e| Error::OverlayLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn lookup(&self, code: &str) -> Option<&str> {
        self.map.get(code).map(String::as_str)
    }

    /// Save to a JSON file (atomic: write to .tmp then rename).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct CitiesResponse {
    #[serde(rename = "Cities", default)]
    cities: Vec<ProviderCity>,
}

#[derive(Debug, Deserialize)]
struct ProviderCity {
    code: String,
    name: String,
    #[serde(rename = "countryName", default)]
    country_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CityAirportsResponse {
    #[serde(rename = "Airports", default)]
    airports: Vec<ProviderAirport>,
}

#[derive(Debug, Deserialize)]
struct ProviderAirport {
    code: String,
}

/// Rebuilds the overlay from the airline-data provider: list every
/// multi-airport city, then fetch each grouping's member airports. Not used
/// during normal pipeline runs.
pub struct OverlayBuilder {
    client: reqwest::Client,
    config: MacConfig,
}

impl OverlayBuilder {
    pub fn new(config: MacConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    pub async fn build(&self) -> Result<MacOverlay> {
        let url = format!("{}/v1/lists/supported/cities", self.config.provider_base_url);
        let listing = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<CitiesResponse>()
            .await?;

        let total = listing.cities.len();
        info!("provider listed {} multi-airport cities", total);

        let mut overlay = MacOverlay::default();
        for (count, city) in listing.cities.into_iter().enumerate() {
            debug!("working {}/{} groupings", count + 1, total);

            if self.config.codes_to_ignore.contains(&city.code) {
                info!("skipping ignored grouping code {}", city.code);
                continue;
            }

            let name = self
                .config
                .name_overrides
                .get(&city.code)
                .cloned()
                .unwrap_or(city.name);

            let members_url = format!(
                "{}/v1/lists/supported/cities/{}/airports",
                self.config.provider_base_url, city.code
            );
            let members = self
                .client
                .get(&members_url)
                .send()
                .await?
                .error_for_status()?
                .json::<CityAirportsResponse>()
                .await?;

            for airport in members.airports {
                overlay.map.insert(airport.code, city.code.clone());
            }
            overlay.airports.push(MacCity {
                code: city.code,
                name,
                country_name: city.country_name,
            });

            tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
        }

        info!("mapped {} airports to groupings", overlay.map.len());
        Ok(overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_and_lookup() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(
            br#"{
                "airports": [{"code": "NYC", "name": "New York", "countryName": "United States"}],
                "map": {"LGA": "NYC", "JFK": "NYC", "EWR": "NYC"}
            }"#,
        )
        .expect("Failed to write overlay file");

        let overlay = MacOverlay::load(file.path()).expect("Failed to load overlay");
        assert_eq!(overlay.lookup("LGA"), Some("NYC"));
        assert_eq!(overlay.lookup("SEA"), None);
        assert_eq!(overlay.airports.len(), 1);
        assert_eq!(overlay.airports[0].name, "New York");
    }

    #[test]
    fn test_missing_file_is_overlay_load_error() {
        match MacOverlay::load("/nonexistent/mac_codes.json") {
            Err(Error::OverlayLoad { path, .. }) => {
                assert!(path.ends_with("mac_codes.json"))
            }
            _ => panic!("expected OverlayLoad error"),
        }
    }

    #[test]
    fn test_corrupt_file_is_overlay_load_error() {
        let mut file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(b"not json").expect("Failed to write");
        assert!(matches!(
            MacOverlay::load(file.path()),
            Err(Error::OverlayLoad { .. })
        ));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("mac_codes.json");

        let mut overlay = MacOverlay::default();
        overlay.map.insert("ORD".to_string(), "CHI".to_string());
        overlay.airports.push(MacCity {
            code: "CHI".to_string(),
            name: "Chicago".to_string(),
            country_name: None,
        });
        overlay.save(&path).expect("Failed to save overlay");

        let loaded = MacOverlay::load(&path).expect("Failed to reload overlay");
        assert_eq!(loaded.lookup("ORD"), Some("CHI"));
        // Temp file from the atomic write must not linger
        assert!(!dir.path().join("mac_codes.tmp").exists());
    }

    #[test]
    fn test_provider_payload_shapes() {
        let listing: CitiesResponse = serde_json::from_str(
            r#"{"Cities": [{"code": "NYC", "name": "New York", "countryName": "United States", "Links": []}]}"#,
        )
        .expect("Failed to parse cities listing");
        assert_eq!(listing.cities[0].code, "NYC");

        let members: CityAirportsResponse =
            serde_json::from_str(r#"{"Airports": [{"code": "LGA"}, {"code": "JFK"}]}"#)
                .expect("Failed to parse airports listing");
        assert_eq!(members.airports.len(), 2);
    }
}
