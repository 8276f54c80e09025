use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Which schema a source file follows. Rail rows may carry a street address
/// and get a different geocoding address shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Airport,
    Rail,
    Mac,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceFile {
    pub path: PathBuf,
    pub kind: SourceKind,
}

/// Traffic filter and count-coercion policy. The thresholds and the
/// string-vs-integer handling of `direct_flights`/`carriers` have changed
/// between dataset generations, so they are all configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterPolicy {
    #[serde(default = "default_min_direct_flights")]
    pub min_direct_flights: i64,
    #[serde(default = "default_min_carriers")]
    pub min_carriers: i64,
    #[serde(default = "default_true")]
    pub coerce_counts_to_integer: bool,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_direct_flights: default_min_direct_flights(),
            min_carriers: default_min_carriers(),
            coerce_counts_to_integer: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeocoderConfig {
    #[serde(default = "default_geocoder_base_url")]
    pub base_url: String,
    /// Overridable via the GEOCODER_API_KEY environment variable.
    #[serde(default)]
    pub api_key: String,
    /// Fixed pause after each geocoder call; the external service enforces a
    /// request-volume quota and exceeding it produces hard failures.
    #[serde(default = "default_geocoder_delay_ms")]
    pub delay_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            base_url: default_geocoder_base_url(),
            api_key: String::new(),
            delay_ms: default_geocoder_delay_ms(),
        }
    }
}

/// Multi-airport-city overlay settings: where the persisted map lives and
/// how to rebuild it from the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct MacConfig {
    #[serde(default = "default_mac_map_file")]
    pub map_file: PathBuf,
    #[serde(default = "default_mac_codes_to_ignore")]
    pub codes_to_ignore: Vec<String>,
    #[serde(default)]
    pub name_overrides: HashMap<String, String>,
    #[serde(default = "default_mac_provider_base_url")]
    pub provider_base_url: String,
    #[serde(default = "default_mac_delay_ms")]
    pub delay_ms: u64,
}

impl Default for MacConfig {
    fn default() -> Self {
        Self {
            map_file: default_mac_map_file(),
            codes_to_ignore: default_mac_codes_to_ignore(),
            name_overrides: HashMap::new(),
            provider_base_url: default_mac_provider_base_url(),
            delay_ms: default_mac_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceFile>,
    /// Fields removed from every emitted record, after all enrichment.
    #[serde(default = "default_skip_fields")]
    pub skip_fields: Vec<String>,
    #[serde(default)]
    pub filter: FilterPolicy,
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub mac: MacConfig,
    /// Optional airport-code -> city-name reference for the cosmetic city
    /// override.
    #[serde(default)]
    pub city_names_file: Option<PathBuf>,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            skip_fields: default_skip_fields(),
            filter: FilterPolicy::default(),
            geocoder: GeocoderConfig::default(),
            mac: MacConfig::default(),
            city_names_file: None,
            output_file: default_output_file(),
        }
    }
}

impl Config {
    /// Load config from a TOML file, falling back to defaults when no path
    /// is given. The geocoder API key can always come from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {:?}", path))?;
                toml::from_str(&contents).with_context(|| format!("Failed to parse {:?}", path))?
            }
            None => Config::default(),
        };

        if let Ok(key) = std::env::var("GEOCODER_API_KEY")
            && !key.is_empty()
        {
            config.geocoder.api_key = key;
        }

        Ok(config)
    }
}

fn default_min_direct_flights() -> i64 {
    5
}

fn default_min_carriers() -> i64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_geocoder_base_url() -> String {
    "https://maps.googleapis.com/maps/api/geocode/json".to_string()
}

fn default_geocoder_delay_ms() -> u64 {
    1000
}

fn default_mac_map_file() -> PathBuf {
    PathBuf::from("sources/mac_codes.json")
}

fn default_mac_codes_to_ignore() -> Vec<String> {
    ["QDF", "QHO", "QPH"].map(String::from).to_vec()
}

fn default_mac_provider_base_url() -> String {
    "https://api.sabre.com".to_string()
}

fn default_mac_delay_ms() -> u64 {
    5000
}

fn default_sources() -> Vec<SourceFile> {
    vec![
        SourceFile {
            path: PathBuf::from("sources/airports.csv"),
            kind: SourceKind::Airport,
        },
        SourceFile {
            path: PathBuf::from("sources/rail.csv"),
            kind: SourceKind::Rail,
        },
    ]
}

fn default_skip_fields() -> Vec<String> {
    [
        "lat",
        "lon",
        "runway_length",
        "elev",
        "icao",
        "direct_flights",
        "carriers",
        "woeid",
        "url",
        "email",
        "phone",
    ]
    .map(String::from)
    .to_vec()
}

fn default_output_file() -> PathBuf {
    PathBuf::from("stations.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.filter.min_direct_flights, 5);
        assert_eq!(config.filter.min_carriers, 2);
        assert!(config.filter.coerce_counts_to_integer);
        assert_eq!(config.sources.len(), 2);
        assert!(config.skip_fields.contains(&"direct_flights".to_string()));
        assert_eq!(config.output_file, PathBuf::from("stations.json"));
    }

    #[test]
    fn test_parse_toml() {
        let toml_str = r#"
            skip_fields = ["lat", "lon", "stateCode"]
            output_file = "out/stations.json"

            [[sources]]
            path = "data/airports.csv"
            kind = "airport"

            [filter]
            min_direct_flights = 2
            coerce_counts_to_integer = false

            [geocoder]
            api_key = "test-key"
            delay_ms = 300
        "#;

        let config: Config = toml::from_str(toml_str).expect("Failed to parse config");
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.sources[0].kind, SourceKind::Airport);
        assert_eq!(config.filter.min_direct_flights, 2);
        // Unset filter fields still take defaults
        assert_eq!(config.filter.min_carriers, 2);
        assert!(!config.filter.coerce_counts_to_integer);
        assert_eq!(config.geocoder.api_key, "test-key");
        assert_eq!(config.geocoder.delay_ms, 300);
        assert_eq!(config.skip_fields, vec!["lat", "lon", "stateCode"]);
        // Mac settings fall back entirely to defaults
        assert_eq!(config.mac.codes_to_ignore, vec!["QDF", "QHO", "QPH"]);
    }
}
