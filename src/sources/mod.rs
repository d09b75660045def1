pub mod live_api;
pub mod regional;
