use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::capacity::CountryProfile;
use crate::error::{Error, Result};

pub const DEFAULT_REPORTS_DIR: &str = "COVID-19/csse_covid_19_data/csse_covid_19_daily_reports/";
pub const DEFAULT_CACHE: &str = "data.csv";
pub const DEFAULT_OUT_DIR: &str = "png";
pub const MAX_FORECAST_DAYS: i64 = 365;
pub const MAX_EXTRAPOLATION_BASE: usize = 60;

/// Epidemiological assumptions behind the reference lines and estimates.
#[derive(Debug, Clone, PartialEq)]
pub struct Constants {
    /// Fraction of cases that need intensive care.
    pub icu_rate: f64,
    /// Average ICU stay in days.
    pub icu_stay_days: f64,
    /// Case fatality rate used to back out infections from deaths.
    pub death_rate: f64,
    /// ICU beds needed per death (ICU rate 0.06 against a death rate of 0.01).
    pub death_icu_ratio: f64,
    /// Case mortality used by the detected fraction plot.
    pub mortality: f64,
    /// Daily growth assumed while a case is incubating and awaiting a test.
    pub delay_growth: f64,
    /// Days of incubation plus test delay.
    pub delay_days: i32,
    /// ICU beds per capita kept for regular patients.
    pub reserved_icu_per_capita: f64,
    /// Scale for "per 1,000,000 capita" axes.
    pub per_million: f64,
    /// Days from infection to death tried by the detected fraction plot.
    pub death_offsets: Vec<usize>,
}

impl Default for Constants {
    fn default() -> Self {
        Constants {
            icu_rate: 0.06,
            icu_stay_days: 18.0,
            death_rate: 0.013,
            death_icu_ratio: 6.0,
            mortality: 0.015,
            delay_growth: 1.33,
            delay_days: 7,
            reserved_icu_per_capita: 3.5 / 100_000.0,
            per_million: 1e6,
            death_offsets: (0..8).map(|i| 7 + 2 * i).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub reports_dir: PathBuf,
    pub cache: PathBuf,
    pub out_dir: PathBuf,
    pub forecast: i64,
    pub extrapolation_base: usize,
    /// First date shown on the case charts.
    pub start: NaiveDate,
    /// First date shown on the infection rate chart.
    pub infection_rate_start: NaiveDate,
    pub spread_rate_avg: usize,
    pub infection_rate_avg: usize,
    pub constants: Constants,
    pub profiles: Vec<CountryProfile>,
    /// Countries that get their own detected fraction chart.
    pub detected_fraction_countries: Vec<String>,
    pub rate_countries: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            reports_dir: PathBuf::from(DEFAULT_REPORTS_DIR),
            cache: PathBuf::from(DEFAULT_CACHE),
            out_dir: PathBuf::from(DEFAULT_OUT_DIR),
            forecast: 14,
            extrapolation_base: 6,
            start: ymd(2020, 2, 15),
            infection_rate_start: ymd(2020, 3, 1),
            spread_rate_avg: 3,
            infection_rate_avg: 5,
            constants: Constants::default(),
            profiles: default_profiles(),
            detected_fraction_countries: ["Germany", "US", "UK", "Italy", "Switzerland", "South Korea"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            rate_countries: ["Germany", "US", "South Korea", "Italy"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Settings {
    pub fn profile(&self, country: &str) -> Option<&CountryProfile> {
        self.profiles.iter().find(|p| p.name == country)
    }

    /// Reject horizons the charts cannot show.
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_FORECAST_DAYS).contains(&self.forecast) {
            return Err(Error::OutOfRange {
                name: "forecast",
                value: self.forecast,
                expected: "0 to 365 days",
            });
        }
        if !(2..=MAX_EXTRAPOLATION_BASE).contains(&self.extrapolation_base) {
            return Err(Error::OutOfRange {
                name: "extrapolation base",
                value: self.extrapolation_base as i64,
                expected: "2 to 60 days",
            });
        }
        Ok(())
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Population and ICU beds per 100,000 inhabitants.
///
/// Sources: Rhodes et al. 2012 (doi:10.1007/s00134-012-2627-8), Phua et al.
/// 2015 (doi:10.1007/s00134-015-4165-7) and the list of countries by
/// hospital beds on Wikipedia.
pub fn default_profiles() -> Vec<CountryProfile> {
    vec![
        CountryProfile::new("Germany", 82.79e6, 29.2),
        CountryProfile::new("US", 327.2e6, 34.2),
        CountryProfile::new("Italy", 60.48e6, 12.5),
        CountryProfile::new("France", 66.99e6, 11.6),
        CountryProfile::new("Spain", 46.66e6, 9.7),
        CountryProfile::new("UK", 66.44e6, 6.6),
        CountryProfile::new("Switzerland", 8.57e6, 11.0),
        CountryProfile::new("Austria", 8.822e6, 21.8),
        CountryProfile::new("Sweden", 10.12e6, 5.8),
        CountryProfile::new("South Korea", 51.47e6, 10.6),
        CountryProfile::new("Japan", 126.8e6, 4.5),
    ]
}

/// Read profiles from a `Country,Population,IcuBedsPer100k` CSV file.
pub fn load_profiles(path: &Path) -> Result<Vec<CountryProfile>> {
    let mut rdr = csv::Reader::from_path(path)?;
    let profiles = rdr
        .deserialize()
        .collect::<std::result::Result<Vec<CountryProfile>, _>>()?;
    Ok(profiles)
}
