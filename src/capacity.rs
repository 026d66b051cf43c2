use serde::Deserialize;

use crate::series::{Point, Series};

/// Static facts about a country used to scale and annotate its charts.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CountryProfile {
    #[serde(rename = "Country")]
    pub name: String,
    #[serde(rename = "Population")]
    pub population: f64,
    /// ICU beds per inhabitant.
    #[serde(rename = "IcuBedsPer100k", deserialize_with = "per_100k")]
    pub icu_per_capita: f64,
}

fn per_100k<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let v = f64::deserialize(deserializer)?;
    Ok(v / 100_000.0)
}

impl CountryProfile {
    pub fn new(name: &str, population: f64, icu_per_100k: f64) -> Self {
        CountryProfile {
            name: name.to_string(),
            population,
            icu_per_capita: icu_per_100k / 100_000.0,
        }
    }

    /// The profile with `reserved` ICU beds per capita held back for
    /// non-epidemic patients.
    pub fn with_reserved_icu(&self, reserved: f64) -> Self {
        CountryProfile {
            icu_per_capita: self.icu_per_capita - reserved,
            ..self.clone()
        }
    }
}

/// Number of cases per capita the ICU beds can take.
///
/// `icu_rate` is the fraction of cases needing intensive care. With a
/// `duration_of_stay` in days the result is a per-day inflow; without one it
/// is the cumulative capacity.
pub fn icu_limit(icu_per_capita: f64, icu_rate: f64, duration_of_stay: Option<f64>) -> f64 {
    icu_per_capita / icu_rate / duration_of_stay.unwrap_or(1.0)
}

/// Infections per capita implied by cumulative deaths at a given case
/// fatality rate.
pub fn estimate_from_deaths(deaths: &Series, death_rate: f64, population: f64) -> Series {
    deaths.map(|d| d / death_rate / population)
}

/// Infections per capita today implied by confirmed cases, assuming cases
/// keep growing by `growth` per day over the `delay_days` between infection
/// and a positive test.
pub fn estimate_from_delay(confirmed: &Series, population: f64, growth: f64, delay_days: i32) -> Series {
    let factor = growth.powi(delay_days);
    confirmed.map(|c| c / population * factor)
}

/// Fraction of infections that were detected, assuming deaths trail
/// infections by `offset` days at the given mortality.
///
/// Dated at the confirmation day; the last `offset` days have no death
/// count to compare against and are dropped.
pub fn detected_fraction(confirmed: &Series, deaths: &Series, mortality: f64, offset: usize) -> Series {
    let points = confirmed
        .points()
        .iter()
        .zip(deaths.points().iter().skip(offset))
        .map(|(c, d)| {
            let infections = d.value.map(|v| v / mortality);
            let value = match (c.value, infections) {
                (Some(c), Some(i)) if i != 0.0 => Some(c / i).filter(|x| x.is_finite()),
                _ => None,
            };
            Point { date: c.date, value }
        })
        .collect();
    Series::new(points)
}
