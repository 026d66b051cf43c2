use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while ingesting reports or deriving chart data.
#[derive(Error, Debug)]
pub enum Error {
    #[error("report directory {0} does not exist or is not a directory")]
    MissingReports(PathBuf),

    #[error("no MM-DD-YYYY.csv daily reports found in {0}")]
    NoReports(PathBuf),

    #[error("failed to read report {path}: {source}")]
    BadReport {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("did not find {0}, run 'kovid --data' first")]
    MissingCache(PathBuf),

    #[error("output directory {0} does not exist")]
    MissingOutputDir(PathBuf),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no data for country '{0}'")]
    UnknownCountry(String),

    #[error("no profile (population, ICU beds) for country '{0}'")]
    UnknownProfile(String),

    #[error("cannot fit log-linear curve: value {value} at position {index} is not positive")]
    NonPositive { index: usize, value: f64 },

    #[error("need at least {needed} points, got {found}")]
    InsufficientPoints { needed: usize, found: usize },

    #[error("cannot fit log-linear curve: least squares did not converge")]
    IllConditioned,

    #[error("moving average window must be at least 1")]
    InvalidWindow,

    #[error("{date} shifted by {days} days is outside the supported calendar")]
    DateOutOfRange { date: NaiveDate, days: i64 },

    #[error("{name} = {value} is out of range, expected {expected}")]
    OutOfRange {
        name: &'static str,
        value: i64,
        expected: &'static str,
    },

    #[error("no countries selected for the {0} plot")]
    NoCountries(&'static str),

    #[error("the {plot} plot will be unreadable for multiple countries (got {count})")]
    SingleCountryOnly { plot: &'static str, count: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
