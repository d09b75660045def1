use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocalizeError {
    #[error("Time '{0}' is not in HH:MM format")]
    InvalidTimeFormat(String),

    #[error("No timezone found for coordinate ({latitude}, {longitude})")]
    TimezoneResolutionFailed { latitude: f64, longitude: f64 },

    #[error("Timezone '{0}' is not a known IANA zone")]
    UnknownTimezone(String),
}
