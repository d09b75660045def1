use crate::types::data_source::{DataSource, DataTable};
use crate::types::feature::Feature;
use crate::weather_data::error::WeatherDataError;
use crate::weather_data::station_series::TIMESTAMP_COLUMN;
use async_compression::tokio::bufread::GzipDecoder;
use futures_util::TryStreamExt;
use log::{debug, info, warn};
use polars::frame::DataFrame;
use polars::prelude::*;
use reqwest::Client;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tokio::{fs, task};
use tokio_util::io::StreamReader;

/// Reads reference tables from a [`DataSource`] into polars frames.
///
/// Every column is read as a string; callers cast to the types they need, so a
/// stray non-numeric cell turns into a null instead of failing the whole table.
pub struct WeatherDataLoader {
    source: DataSource,
    cache_dir: Option<PathBuf>,
    download_client: Client,
}

impl WeatherDataLoader {
    pub fn new(source: DataSource, cache_dir: Option<&Path>) -> WeatherDataLoader {
        WeatherDataLoader {
            source,
            cache_dir: cache_dir.map(Path::to_path_buf),
            download_client: Client::new(),
        }
    }

    /// Loads one table. With a cache directory, the first load is written out
    /// as parquet and later loads scan that file instead of the source.
    pub async fn get_frame(&self, table: DataTable) -> Result<LazyFrame, WeatherDataError> {
        let Some(cache_dir) = &self.cache_dir else {
            return Ok(self.read_table(table).await?.lazy());
        };

        let parquet_path = cache_dir.join(table.cache_file_name());
        if fs::metadata(&parquet_path).await.is_ok() {
            debug!("Cache hit for {} at {:?}", table, parquet_path);
        } else {
            warn!("Cache miss for {}. Reading from source.", table);
            let df = self.read_table(table).await?;

            fs::create_dir_all(cache_dir)
                .await
                .map_err(|e| WeatherDataError::CacheDirCreation(cache_dir.clone(), e))?;

            Self::cache_dataframe(df, &parquet_path).await?;
            info!("Cached {} to {:?}", table, parquet_path);
        }

        LazyFrame::scan_parquet(&parquet_path, Default::default())
            .map_err(|e| WeatherDataError::ParquetScan(parquet_path.clone(), e))
    }

    async fn read_table(&self, table: DataTable) -> Result<DataFrame, WeatherDataError> {
        let df = match &self.source {
            DataSource::Directory(root) => {
                let path = root.join(table.path_segment());
                fs::metadata(&path)
                    .await
                    .map_err(|e| WeatherDataError::FileRead(path.clone(), e))?;
                task::spawn_blocking(move || Self::read_csv(path, table)).await??
            }
            DataSource::Remote { base_url, gzip } => {
                let raw_bytes = self.download(base_url, *gzip, table).await?;
                Self::csv_to_dataframe(raw_bytes, table).await?
            }
        };
        Self::narrow(df, table)
    }

    /// Drops the columns of a station series that nothing reads. Raw LCD
    /// exports carry well over a hundred columns besides the eight features.
    fn narrow(df: DataFrame, table: DataTable) -> Result<DataFrame, WeatherDataError> {
        if !matches!(table, DataTable::StationSeries(_)) {
            return Ok(df);
        }
        let keep: Vec<&str> = std::iter::once(TIMESTAMP_COLUMN)
            .chain(Feature::ALL.iter().map(|feature| feature.column_name()))
            .filter(|name| df.get_column_index(name).is_some())
            .collect();
        Ok(df.select(keep)?)
    }

    /// Downloads (and with `gzip`, decompresses) one table.
    async fn download(
        &self,
        base_url: &str,
        gzip: bool,
        table: DataTable,
    ) -> Result<Vec<u8>, WeatherDataError> {
        let url = format!(
            "{}/{}{}",
            base_url.trim_end_matches('/'),
            table.path_segment(),
            if gzip { ".gz" } else { "" }
        );
        info!("Downloading {} from {}", table, url);

        let response = self
            .download_client
            .get(&url)
            .send()
            .await
            .map_err(|e| WeatherDataError::NetworkRequest(url.clone(), e))?;

        let response = match response.error_for_status() {
            Ok(resp) => resp,
            Err(e) => {
                warn!("HTTP error for {}: {:?}", url, e);
                return Err(if let Some(status) = e.status() {
                    WeatherDataError::HttpStatus {
                        url,
                        status,
                        source: e,
                    }
                } else {
                    WeatherDataError::NetworkRequest(url, e)
                });
            }
        };

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let mut stream_reader = StreamReader::new(stream);
        let mut body = Vec::new();
        if gzip {
            GzipDecoder::new(stream_reader)
                .read_to_end(&mut body)
                .await
                .map_err(WeatherDataError::DownloadIo)?;
        } else {
            stream_reader
                .read_to_end(&mut body)
                .await
                .map_err(WeatherDataError::DownloadIo)?;
        }
        info!("Downloaded {} bytes for {}", body.len(), table);
        Ok(body)
    }

    /// Parses downloaded CSV bytes through a temporary file on a blocking thread.
    async fn csv_to_dataframe(
        bytes: Vec<u8>,
        table: DataTable,
    ) -> Result<DataFrame, WeatherDataError> {
        task::spawn_blocking(move || {
            let mut temp_file = NamedTempFile::new()
                .map_err(|e| WeatherDataError::CsvReadIo { table, source: e })?;
            temp_file
                .write_all(&bytes)
                .map_err(|e| WeatherDataError::CsvReadIo { table, source: e })?;
            temp_file
                .flush()
                .map_err(|e| WeatherDataError::CsvReadIo { table, source: e })?;

            Self::read_csv(temp_file.path().to_path_buf(), table)
        })
        .await?
    }

    fn read_csv(path: PathBuf, table: DataTable) -> Result<DataFrame, WeatherDataError> {
        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .try_into_reader_with_file_path(Some(path))
            .map_err(|e| WeatherDataError::CsvReadPolars { table, source: e })?
            .finish()
            .map_err(|e| WeatherDataError::CsvReadPolars { table, source: e })
    }

    /// Writes a DataFrame to a Parquet file using spawn_blocking.
    async fn cache_dataframe(mut df: DataFrame, path: &Path) -> Result<(), WeatherDataError> {
        let path_buf = path.to_path_buf();
        task::spawn_blocking(move || {
            let file = std::fs::File::create(&path_buf)
                .map_err(|e| WeatherDataError::ParquetWriteIo(path_buf.clone(), e))?;
            ParquetWriter::new(file)
                .with_compression(ParquetCompression::Snappy)
                .finish(&mut df)
                .map_err(|e| WeatherDataError::ParquetWritePolars(path_buf, e))?;
            Ok::<(), WeatherDataError>(())
        })
        .await??;
        Ok(())
    }
}
