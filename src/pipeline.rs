use chrono::Utc;
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

use crate::cities::CityNames;
use crate::config::Config;
use crate::error::Result;
use crate::geocode::Geocode;
use crate::normalize::{Normalizer, Outcome, StationRecord};
use crate::overlay::MacOverlay;
use crate::source::RowReader;

/// Drives one full run: every configured source file in order, every row in
/// file order, one logical worker. Output order mirrors source order, with
/// filtered rows simply absent. Any hard failure propagates immediately and
/// no further rows are processed.
pub struct Pipeline<'a> {
    config: &'a Config,
    geocoder: &'a dyn Geocode,
    overlay: &'a MacOverlay,
    cities: Option<&'a CityNames>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        geocoder: &'a dyn Geocode,
        overlay: &'a MacOverlay,
        cities: Option<&'a CityNames>,
    ) -> Self {
        Self {
            config,
            geocoder,
            overlay,
            cities,
        }
    }

    pub async fn run(&self) -> Result<Vec<StationRecord>> {
        let run_time = Utc::now();
        let skip_fields: HashSet<String> = self.config.skip_fields.iter().cloned().collect();
        let normalizer = Normalizer::new(
            &self.config.filter,
            &skip_fields,
            self.overlay,
            self.cities,
            self.geocoder,
            run_time,
        );

        let mut stations = Vec::new();
        for source in &self.config.sources {
            info!("reading {:?}", source.path);
            let reader = RowReader::open(&source.path, true)?;

            let mut total = 0usize;
            let mut skipped = 0usize;
            for row in reader {
                let row = row?;
                total += 1;
                match normalizer.normalize(&row, source.kind).await? {
                    Outcome::Station(record) => stations.push(*record),
                    Outcome::Skipped => skipped += 1,
                }
            }

            info!(
                "finished {:?}: {} rows, {} kept, {} skipped",
                source.path,
                total,
                total - skipped,
                skipped
            );
        }

        Ok(stations)
    }
}

/// Serialize the station set (atomic: write to .tmp then rename), so a
/// failed run never leaves a partial artifact behind.
pub fn write_stations(path: &Path, stations: &[StationRecord]) -> Result<()> {
    let json = serde_json::to_string_pretty(stations)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
