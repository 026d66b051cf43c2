use chrono::{Duration, NaiveDate};

use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// A dated value. `None` marks a value that is numerically undefined, such
/// as a growth rate over a zero base; it keeps its date but is never drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    points: Vec<Point>,
}

impl Series {
    pub fn new(points: Vec<Point>) -> Self {
        Series { points }
    }

    /// Build a series, turning non-finite values into gaps.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, f64)>,
    {
        Series {
            points: values
                .into_iter()
                .map(|(date, v)| Point {
                    date,
                    value: Some(v).filter(|x| x.is_finite()),
                })
                .collect(),
        }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn defined(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.points
            .iter()
            .filter_map(|p| p.value.map(|v| (p.date, v)))
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Apply `f` to every defined value; results that are not finite become gaps.
    pub fn map<F>(&self, f: F) -> Series
    where
        F: Fn(f64) -> f64,
    {
        Series {
            points: self
                .points
                .iter()
                .map(|p| Point {
                    date: p.date,
                    value: p.value.map(&f).filter(|x| x.is_finite()),
                })
                .collect(),
        }
    }
}

/// `date` moved by `days`, or an error once that leaves chrono's calendar.
pub fn shift_date(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    Duration::try_days(days)
        .and_then(|d| date.checked_add_signed(d))
        .ok_or(Error::DateOutOfRange { date, days })
}

/// `num / den`, or `None` when the quotient is undefined.
fn ratio(num: f64, den: f64) -> Option<f64> {
    if den == 0.0 {
        return None;
    }
    Some(num / den).filter(|x| x.is_finite())
}

fn first_difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Cumulative counts of one country, date-sorted.
#[derive(Debug, Clone)]
pub struct CountryHistory {
    pub country: String,
    dates: Vec<NaiveDate>,
    confirmed: Vec<f64>,
    deaths: Vec<f64>,
}

impl CountryHistory {
    pub fn extract(data: &Dataset, country: &str) -> Result<Self> {
        let rows = data.country(country)?;
        Ok(CountryHistory {
            country: country.to_string(),
            dates: rows.iter().map(|r| r.date).collect(),
            confirmed: rows.iter().map(|r| r.confirmed as f64).collect(),
            deaths: rows.iter().map(|r| r.deaths as f64).collect(),
        })
    }

    pub fn confirmed(&self) -> Series {
        Series::from_values(self.dates.iter().copied().zip(self.confirmed.iter().copied()))
    }

    pub fn deaths(&self) -> Series {
        Series::from_values(self.dates.iter().copied().zip(self.deaths.iter().copied()))
    }

    /// Daily new infections, dated at the earlier of the two days.
    pub fn new_infections(&self) -> Series {
        Series::from_values(
            self.dates
                .iter()
                .copied()
                .zip(first_difference(&self.confirmed)),
        )
    }

    /// Daily relative growth of confirmed cases, dated at the earlier day.
    pub fn spread_rate(&self) -> Series {
        let points = first_difference(&self.confirmed)
            .into_iter()
            .zip(&self.confirmed)
            .zip(&self.dates)
            .map(|((diff, prior), &date)| Point {
                date,
                value: ratio(diff, *prior),
            })
            .collect();
        Series::new(points)
    }

    /// Ratio of consecutive daily new infections, dated at the later day.
    pub fn infection_rate(&self) -> Series {
        let infections = first_difference(&self.confirmed);
        let points = infections
            .windows(2)
            .zip(self.dates.iter().skip(2))
            .map(|(w, &date)| Point {
                date,
                value: ratio(w[1], w[0]),
            })
            .collect();
        Series::new(points)
    }

    /// Daily deaths, dated at the earlier day.
    pub fn deaths_per_day(&self) -> Series {
        Series::from_values(self.dates.iter().copied().zip(first_difference(&self.deaths)))
    }
}
