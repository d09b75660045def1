use crate::types::data_source::{DataSource, DataTable};
use crate::weather_data::data_loader::WeatherDataLoader;
use crate::weather_data::error::WeatherDataError;
use log::debug;
use polars::prelude::LazyFrame;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OnceCell};

/// Process-wide table cache.
///
/// Each table gets its own [`OnceCell`]: concurrent requests for a table that
/// isn't loaded yet wait on a single load and then share its frame. A failed
/// or timed-out load leaves the cell empty, so the next request retries.
///
/// Without a disk cache a station series is held in memory only while it is
/// being loaded; once every waiter has its frame the entry is dropped, so the
/// map doesn't grow with every station ever queried.
pub struct FrameFetcher {
    loader: WeatherDataLoader,
    load_timeout: Duration,
    has_disk_cache: bool,
    frames: Mutex<HashMap<DataTable, Arc<OnceCell<LazyFrame>>>>,
}

impl FrameFetcher {
    pub fn new(source: DataSource, cache_dir: Option<&Path>, load_timeout: Duration) -> Self {
        Self {
            loader: WeatherDataLoader::new(source, cache_dir),
            load_timeout,
            has_disk_cache: cache_dir.is_some(),
            frames: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the frame for `table`, loading it on first use.
    pub async fn get_frame(&self, table: DataTable) -> Result<LazyFrame, WeatherDataError> {
        // Only hold the map lock long enough to grab the cell.
        let cell = {
            let mut frames = self.frames.lock().await;
            frames.entry(table).or_default().clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                match tokio::time::timeout(self.load_timeout, self.loader.get_frame(table)).await {
                    Ok(result) => result,
                    Err(_) => Err(WeatherDataError::Timeout {
                        what: format!("Loading {}", table),
                        after: self.load_timeout,
                    }),
                }
            })
            .await
            .cloned();

        if !self.retains(table) {
            let mut frames = self.frames.lock().await;
            if frames.get(&table).is_some_and(|held| Arc::ptr_eq(held, &cell)) {
                debug!("Releasing in-memory {}", table);
                frames.remove(&table);
            }
        }
        result
    }

    /// Whether a loaded frame for `table` stays in the map.
    ///
    /// Reference tables are few and always kept. Station series are only kept
    /// when they are backed by a parquet file on disk.
    fn retains(&self, table: DataTable) -> bool {
        self.has_disk_cache || !matches!(table, DataTable::StationSeries(_))
    }

    #[cfg(test)]
    pub(crate) async fn held_tables(&self) -> usize {
        self.frames.lock().await.len()
    }
}
