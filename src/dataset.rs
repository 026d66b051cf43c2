use std::path::Path;

use chrono::NaiveDate;
use itertools::Itertools;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::report::{Region, ReportRow};

/// Record layout of the `data.csv` cache.
#[derive(Debug, Serialize, Deserialize, Clone)]
struct CacheRecord {
    #[serde(rename = "Country")]
    country: String,
    #[serde(rename = "Date")]
    #[serde(with = "ymd_date_format")]
    date: NaiveDate,
    #[serde(rename = "Confirmed")]
    confirmed: i64,
    #[serde(rename = "Deaths")]
    deaths: i64,
    #[serde(rename = "Recovered")]
    recovered: i64,
}

mod ymd_date_format {
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";
    pub fn serialize<S>(nd: &chrono::NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}", nd.format(FORMAT));
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<chrono::NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Accept timestamps written by other tools, e.g. "2020-03-01 00:00:00".
        let day = s.get(..10).unwrap_or(&s);
        chrono::NaiveDate::parse_from_str(day, FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Country-level report rows from all snapshots, ordered by date.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    rows: Vec<ReportRow>,
}

impl Dataset {
    /// Build a dataset from country-total rows. Province rows are dropped.
    pub fn from_rows(rows: Vec<ReportRow>) -> Self {
        let mut rows: Vec<ReportRow> = rows
            .into_iter()
            .filter(|r| r.region == Region::CountryTotal)
            .collect();
        rows.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.country.cmp(&b.country)));
        let dataset = Dataset { rows };
        if let Some((country, date)) = dataset.duplicates().first() {
            warn!("{} has more than one row for {}", country, date);
        }
        dataset
    }

    pub fn rows(&self) -> &[ReportRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.rows.first().map(|r| r.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    pub fn countries(&self) -> Vec<&str> {
        self.rows
            .iter()
            .map(|r| r.country.as_str())
            .unique()
            .sorted()
            .collect()
    }

    pub fn country(&self, name: &str) -> Result<Vec<&ReportRow>> {
        let rows: Vec<&ReportRow> = self
            .rows
            .iter()
            .filter(|r| r.country == name)
            .sorted_by_key(|r| r.date)
            .collect();
        if rows.is_empty() {
            return Err(Error::UnknownCountry(name.to_string()));
        }
        Ok(rows)
    }

    /// (country, date) pairs that occur more than once.
    pub fn duplicates(&self) -> Vec<(&str, NaiveDate)> {
        self.rows
            .iter()
            .map(|r| (r.country.as_str(), r.date))
            .duplicates()
            .collect()
    }

    pub fn read_cache(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(Error::MissingCache(path.to_path_buf()));
        }
        let mut rdr = csv::Reader::from_path(path)?;
        let rows = rdr
            .deserialize::<CacheRecord>()
            .map(|rec| {
                rec.map(|r| ReportRow {
                    country: r.country,
                    region: Region::CountryTotal,
                    confirmed: r.confirmed,
                    deaths: r.deaths,
                    recovered: r.recovered,
                    date: r.date,
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        info!("Read {} rows from {}", rows.len(), path.display());
        Ok(Dataset::from_rows(rows))
    }

    pub fn write_cache(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;
        for r in &self.rows {
            wtr.serialize(CacheRecord {
                country: r.country.clone(),
                date: r.date,
                confirmed: r.confirmed,
                deaths: r.deaths,
                recovered: r.recovered,
            })?;
        }
        wtr.flush()?;
        info!("Wrote {} rows to {}", self.len(), path.display());
        Ok(())
    }
}
