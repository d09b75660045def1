pub mod error;
pub mod localizer;
