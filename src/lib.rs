//! Station ingestion pipeline: reads airport, rail, and multi-airport-city
//! CSV sources, enriches rows through an external geocoder, and emits the
//! unified station document set ready for bulk load.

pub mod cities;
pub mod config;
pub mod error;
pub mod geocode;
pub mod normalize;
pub mod overlay;
pub mod pipeline;
pub mod source;
