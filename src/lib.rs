pub mod app;
pub mod capacity;
pub mod chart;
pub mod config;
pub mod dataset;
pub mod error;
pub mod plots;
pub mod report;
pub mod series;
pub mod smoothing;

pub use error::{Error, Result};
