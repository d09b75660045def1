pub(crate) mod accumulator;
pub mod cascade;
pub mod tier;
