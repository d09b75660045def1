//! Construction-time settings for [`crate::WxCascade`].

use crate::types::data_source::DataSource;
use bon::Builder;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_FORECAST_URL: &str = "https://api.meteomatics.com";
pub const DEFAULT_FORECAST_MODEL: &str = "ecmwf-ifs";
pub const DEFAULT_FORECAST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Basic-auth credentials for the forecast API.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub username: String,
    pub password: String,
}

impl ApiCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Where and how the live forecast tier calls out.
///
/// # Examples
///
/// ```
/// use wxcascade::{ApiCredentials, ForecastConfig};
///
/// let config = ForecastConfig::builder()
///     .credentials(ApiCredentials::new("user", "secret"))
///     .build();
/// assert_eq!(config.model, "ecmwf-ifs");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ForecastConfig {
    pub credentials: ApiCredentials,
    #[builder(into, default = DEFAULT_FORECAST_URL.to_string())]
    pub base_url: String,
    /// Forecast model passed as the `source` query parameter.
    #[builder(into, default = DEFAULT_FORECAST_MODEL.to_string())]
    pub model: String,
    #[builder(default = DEFAULT_FORECAST_TIMEOUT)]
    pub timeout: Duration,
}

/// Everything a [`crate::WxCascade`] needs at startup.
///
/// Leaving `forecast` unset disables the live tier; every resolution then
/// reports it as not configured and starts at the nearest stations.
#[derive(Debug, Clone, Builder)]
pub struct ResolverConfig {
    /// Location of the reference tables.
    pub data: DataSource,
    pub forecast: Option<ForecastConfig>,
    /// Parquet cache for loaded tables. Without one, tables are held in
    /// memory only.
    #[builder(into)]
    pub cache_dir: Option<PathBuf>,
    /// Bound on every station series and aggregate table load.
    #[builder(default = DEFAULT_SOURCE_TIMEOUT)]
    pub source_timeout: Duration,
    #[builder(default = DEFAULT_MAX_CONCURRENT_FETCHES)]
    pub max_concurrent_fetches: usize,
}
