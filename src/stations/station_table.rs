//! Reads station metadata out of the station reference table.

use crate::stations::error::LocateStationError;
use crate::types::data_source::DataTable;
use crate::types::station::{LatLon, Station};
use crate::weather_data::extractor::{float_column, int_column};
use crate::weather_data::frame_fetcher::FrameFetcher;
use bincode::config::{Configuration, Fixint, LittleEndian};
use log::{debug, info, warn};
use polars::prelude::DataFrame;
use std::collections::HashSet;
use std::path::Path;

const BINCODE_CACHE_FILE_NAME: &str = "stations_index.bin";
const BINCODE_CONFIG: Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_fixed_int_encoding();

const ID_COLUMN: &str = "STATION_ID";
const LATITUDE_COLUMN: &str = "LATITUDE";
const LONGITUDE_COLUMN: &str = "LONGITUDE";
const DISTANCE_COLUMN: &str = "DISTANCE_KM";

/// Loads every station, preferring the decoded bincode cache in `cache_dir`.
pub async fn load_stations(
    fetcher: &FrameFetcher,
    cache_dir: Option<&Path>,
) -> Result<Vec<Station>, LocateStationError> {
    let cache_file = cache_dir.map(|dir| dir.join(BINCODE_CACHE_FILE_NAME));

    if let Some(cache_file) = cache_file.as_ref().filter(|f| f.exists()) {
        let path_clone = cache_file.clone();
        let stations =
            tokio::task::spawn_blocking(move || get_cached_stations(&path_clone)).await??;
        debug!("Read {} stations from {}", stations.len(), cache_file.display());
        return Ok(stations);
    }

    let frame = fetcher.get_frame(DataTable::StationIndex).await?;
    let stations = tokio::task::spawn_blocking(move || {
        let df = frame.collect()?;
        parse_stations(&df)
    })
    .await??;
    info!("Loaded {} stations from the reference table", stations.len());

    if let Some(cache_file) = cache_file {
        cache_stations(stations.clone(), &cache_file).await?;
    }
    Ok(stations)
}

/// One [`Station`] per distinct id, keeping the first row seen. Rows without
/// a usable id or coordinate are skipped.
pub fn parse_stations(df: &DataFrame) -> Result<Vec<Station>, LocateStationError> {
    let ids = int_column(df, ID_COLUMN)
        .ok_or_else(|| LocateStationError::MissingColumn(ID_COLUMN.to_string()))?;
    let latitudes = float_column(df, LATITUDE_COLUMN)
        .ok_or_else(|| LocateStationError::MissingColumn(LATITUDE_COLUMN.to_string()))?;
    let longitudes = float_column(df, LONGITUDE_COLUMN)
        .ok_or_else(|| LocateStationError::MissingColumn(LONGITUDE_COLUMN.to_string()))?;
    let distances = float_column(df, DISTANCE_COLUMN);

    let mut seen = HashSet::new();
    let mut stations = Vec::new();
    let mut skipped = 0usize;

    for idx in 0..df.height() {
        let (Some(id), Some(lat), Some(lon)) =
            (ids.get(idx), latitudes.get(idx), longitudes.get(idx))
        else {
            skipped += 1;
            continue;
        };
        let location = LatLon(lat, lon);
        if id < 0 || !location.is_valid() {
            skipped += 1;
            continue;
        }
        let id = id as u64;
        if !seen.insert(id) {
            continue;
        }
        stations.push(Station {
            id,
            location,
            reference_distance_km: distances.as_ref().and_then(|d| d.get(idx)),
        });
    }

    if skipped > 0 {
        warn!("Skipped {} station rows with a missing id or coordinate", skipped);
    }
    Ok(stations)
}

fn get_cached_stations(cache_path: &Path) -> Result<Vec<Station>, LocateStationError> {
    let bytes = std::fs::read(cache_path)
        .map_err(|e| LocateStationError::CacheRead(cache_path.to_path_buf(), e))?;
    let (decoded_stations, _) =
        bincode::serde::decode_from_slice::<Vec<Station>, _>(&bytes, BINCODE_CONFIG)
            .map_err(|e| LocateStationError::CacheDecode(cache_path.to_path_buf(), Box::from(e)))?;
    Ok(decoded_stations)
}

async fn cache_stations(stations: Vec<Station>, cache_path: &Path) -> Result<(), LocateStationError> {
    let bincode_data = tokio::task::spawn_blocking(move || {
        bincode::serde::encode_to_vec(stations, BINCODE_CONFIG)
            .map_err(|e| LocateStationError::CacheEncode(Box::new(e)))
    })
    .await??;
    tokio::fs::write(cache_path, &bincode_data)
        .await
        .map_err(|e| LocateStationError::CacheWrite(cache_path.to_path_buf(), e))?;
    debug!(
        "Wrote station cache ({} bytes) to {}",
        bincode_data.len(),
        cache_path.display()
    );
    Ok(())
}
