pub mod airports;
pub mod flight;
pub mod model;
