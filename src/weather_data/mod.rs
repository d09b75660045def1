pub mod data_loader;
pub mod error;
pub(crate) mod extractor;
pub mod frame_fetcher;
pub mod station_series;
