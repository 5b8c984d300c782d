//! Handles serialising and saving data to disk in the _parquet_ file format.

pub mod slopes;

pub use slopes::{save_slopes, SlopeRow};
