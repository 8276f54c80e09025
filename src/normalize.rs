use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::cities::CityNames;
use crate::config::{FilterPolicy, SourceKind};
use crate::error::Result;
use crate::geocode::Geocode;
use crate::overlay::MacOverlay;
use crate::source::RawRow;

/// Station types that count as airports for the traffic filter and for
/// macCode attachment. Mac aggregates and rail stations are not included.
pub fn is_airport_kind(station_type: &str) -> bool {
    station_type == "Airports" || station_type == "Other Airport"
}

/// GeoJSON-style point, longitude first. Coordinates may be NaN when the
/// source carried blank or non-numeric values; NaN is propagated, not
/// corrected, and serializes as null.
#[derive(Debug, Clone, Serialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub geometry_type: &'static str,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            geometry_type: "Point",
            coordinates: [lon, lat],
        }
    }
}

/// `direct_flights`/`carriers` value under the configured coercion policy:
/// either a parsed integer (0 fallback) or the raw source string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Count {
    Number(i64),
    Raw(String),
}

/// One normalized station document, keyed by `code`. Every field the skip
/// set may remove is an `Option` that vanishes from the serialized output
/// when cleared.
#[derive(Debug, Clone, Serialize)]
pub struct StationRecord {
    pub code: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub station_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tz: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub woeid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icao: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runway_length: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elev: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_flights: Option<Count>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carriers: Option<Count>,
    pub location: GeoPoint,
    #[serde(rename = "stateCode", skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(rename = "countryCode", skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(rename = "macCode", skip_serializing_if = "Option::is_none")]
    pub mac_code: Option<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

impl StationRecord {
    /// Final projection: clear every configured skip field. Runs after all
    /// enrichment, so a field set by the geocoder is still removed when the
    /// skip set names it. Names with no removable counterpart (`code`,
    /// `type`, `location`, timestamps) are ignored.
    pub fn prune(&mut self, skip_fields: &HashSet<String>) {
        for field in skip_fields {
            match field.as_str() {
                "city" => self.city = None,
                "state" => self.state = None,
                "country" => self.country = None,
                "tz" => self.tz = None,
                "phone" => self.phone = None,
                "email" => self.email = None,
                "url" => self.url = None,
                "woeid" => self.woeid = None,
                "icao" => self.icao = None,
                "runway_length" => self.runway_length = None,
                "elev" => self.elev = None,
                "lat" => self.lat = None,
                "lon" => self.lon = None,
                "direct_flights" => self.direct_flights = None,
                "carriers" => self.carriers = None,
                "stateCode" => self.state_code = None,
                "countryCode" => self.country_code = None,
                "macCode" => self.mac_code = None,
                _ => {}
            }
        }
    }
}

/// Normalizer output: a record, or nothing at all for filtered rows.
#[derive(Debug)]
pub enum Outcome {
    Station(Box<StationRecord>),
    Skipped,
}

/// Applies the per-row business rules: traffic filter, geocode-or-reuse,
/// field synthesis, city override, overlay attachment, and the final skip
/// projection. Holds only borrowed, read-only state; one instance serves a
/// whole run.
pub struct Normalizer<'a> {
    policy: &'a FilterPolicy,
    skip_fields: &'a HashSet<String>,
    overlay: &'a MacOverlay,
    cities: Option<&'a CityNames>,
    geocoder: &'a dyn Geocode,
    run_time: DateTime<Utc>,
}

impl<'a> Normalizer<'a> {
    pub fn new(
        policy: &'a FilterPolicy,
        skip_fields: &'a HashSet<String>,
        overlay: &'a MacOverlay,
        cities: Option<&'a CityNames>,
        geocoder: &'a dyn Geocode,
        run_time: DateTime<Utc>,
    ) -> Self {
        Self {
            policy,
            skip_fields,
            overlay,
            cities,
            geocoder,
            run_time,
        }
    }

    pub async fn normalize(&self, row: &RawRow, kind: SourceKind) -> Result<Outcome> {
        let station_type = row
            .get_non_blank("type")
            .map(str::to_string)
            .unwrap_or_else(|| default_type(kind).to_string());
        let code = row.get("code").unwrap_or_default().to_string();

        // Traffic filter comes first: filtered rows never hit the geocoder.
        let direct_flights = parse_count(row.get("direct_flights"));
        let carriers = parse_count(row.get("carriers"));
        if is_airport_kind(&station_type)
            && direct_flights < self.policy.min_direct_flights
            && carriers < self.policy.min_carriers
        {
            debug!(
                "skipping {}: {} direct flights, {} carriers",
                code, direct_flights, carriers
            );
            return Ok(Outcome::Skipped);
        }

        // Coordinates from the row when it has any, otherwise one geocoder
        // call. A soft miss leaves the geocoded fields blank; a hard
        // failure propagates and aborts the file.
        let raw_lat = row.get_non_blank("lat");
        let raw_lon = row.get_non_blank("lon");
        let mut state_code = None;
        let mut country_code = None;
        let (lat, lon) = if raw_lat.is_none() && raw_lon.is_none() {
            let address = build_address(row, kind);
            match self.geocoder.geocode(&address).await? {
                Some(hit) => {
                    state_code = Some(hit.state_code().unwrap_or_default().to_string());
                    country_code = Some(hit.country_code().unwrap_or_default().to_string());
                    (hit.lat, hit.lon)
                }
                None => {
                    debug!("no geocoding result for {:?}", address);
                    state_code = Some(String::new());
                    country_code = Some(String::new());
                    (f64::NAN, f64::NAN)
                }
            }
        } else {
            (parse_coordinate(raw_lat), parse_coordinate(raw_lon))
        };

        let mut city = row.get("city").map(str::to_string);
        if let Some(cities) = self.cities
            && let Some(name) = cities.resolve(&code)
        {
            city = Some(name.to_string());
        }

        let mac_code = if is_airport_kind(&station_type) {
            self.overlay.lookup(&code).map(str::to_string)
        } else {
            None
        };

        let (direct_flights, carriers) = if self.policy.coerce_counts_to_integer {
            (Some(Count::Number(direct_flights)), Some(Count::Number(carriers)))
        } else {
            (
                row.get("direct_flights").map(|v| Count::Raw(v.to_string())),
                row.get("carriers").map(|v| Count::Raw(v.to_string())),
            )
        };

        let mut record = StationRecord {
            code,
            name: row.get("name").unwrap_or_default().to_string(),
            city,
            state: row.get("state").map(str::to_string),
            country: row.get("country").map(str::to_string),
            station_type,
            tz: row.get("tz").map(str::to_string),
            phone: row.get("phone").map(str::to_string),
            email: row.get("email").map(str::to_string),
            url: row.get("url").map(str::to_string),
            woeid: row.get("woeid").map(str::to_string),
            icao: row.get("icao").map(str::to_string),
            runway_length: row.get("runway_length").map(str::to_string),
            elev: row.get("elev").map(str::to_string),
            lat: row.get("lat").map(str::to_string),
            lon: row.get("lon").map(str::to_string),
            direct_flights,
            carriers,
            location: GeoPoint::new(lon, lat),
            state_code,
            country_code,
            mac_code,
            created: self.run_time,
            updated: self.run_time,
        };

        record.prune(self.skip_fields);
        Ok(Outcome::Station(Box::new(record)))
    }
}

fn default_type(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::Airport => "Airports",
        SourceKind::Rail => "Railway Stations",
        SourceKind::Mac => "Mac Airports",
    }
}

/// Count columns coerce to 0 when blank or non-numeric.
fn parse_count(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

/// Coordinates parse to NaN when present-but-invalid; NaN propagates.
fn parse_coordinate(value: Option<&str>) -> f64 {
    value
        .map(|v| v.trim().parse().unwrap_or(f64::NAN))
        .unwrap_or(f64::NAN)
}

/// Address text for the geocoder. Rail rows with a street address use the
/// street/city/state/zip shape; everything else uses city/state/country.
fn build_address(row: &RawRow, kind: SourceKind) -> String {
    if kind == SourceKind::Rail
        && let Some(street) = row.get_non_blank("address1")
    {
        return format!(
            "{} {}, {} {}",
            street,
            row.get("city").unwrap_or_default(),
            row.get("state").unwrap_or_default(),
            row.get("zip").unwrap_or_default()
        );
    }
    format!(
        "{}, {}, {}",
        row.get("city").unwrap_or_default(),
        row.get("state").unwrap_or_default(),
        row.get("country").unwrap_or_default()
    )
}
