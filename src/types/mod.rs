pub mod data_source;
pub mod feature;
pub mod observation;
pub mod query;
pub mod station;
