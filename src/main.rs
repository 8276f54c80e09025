use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stations::cities::CityNames;
use stations::config::Config;
use stations::geocode::{GoogleGeocoder, Throttled};
use stations::overlay::{MacOverlay, OverlayBuilder};
use stations::pipeline::{self, Pipeline};

#[derive(Parser, Debug)]
#[command(
    name = "stations",
    about = "Build the unified station dataset from CSV sources."
)]
struct Args {
    /// Path to the TOML config; built-in defaults are used when absent
    #[arg(long = "config")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Regenerate the stations JSON from the configured CSV sources
    Regen,
    /// Rebuild the multi-airport-city overlay from the provider
    Mac,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Regen => regen(&config).await,
        Command::Mac => rebuild_mac(&config).await,
    }
}

async fn regen(config: &Config) -> Result<()> {
    let overlay = MacOverlay::load(&config.mac.map_file)?;
    info!(
        "loaded overlay: {} airports mapped to groupings",
        overlay.map.len()
    );

    let cities = match &config.city_names_file {
        Some(path) => Some(CityNames::load(path)?),
        None => None,
    };

    let geocoder = Throttled::new(
        GoogleGeocoder::new(
            config.geocoder.base_url.clone(),
            config.geocoder.api_key.clone(),
        ),
        Duration::from_millis(config.geocoder.delay_ms),
    );

    let stations = Pipeline::new(config, &geocoder, &overlay, cities.as_ref())
        .run()
        .await?;
    pipeline::write_stations(&config.output_file, &stations)?;
    info!(
        "wrote {} stations to {:?}",
        stations.len(),
        config.output_file
    );
    Ok(())
}

async fn rebuild_mac(config: &Config) -> Result<()> {
    let overlay = OverlayBuilder::new(config.mac.clone()).build().await?;
    overlay.save(&config.mac.map_file)?;
    info!(
        "wrote overlay ({} airports mapped) to {:?}",
        overlay.map.len(),
        config.mac.map_file
    );
    Ok(())
}
