//! Importer for the JHU CSSE daily report snapshots.
//!
//! Each file in the report directory is named `MM-DD-YYYY.csv` and holds one
//! row per country or province as of that day. Two header conventions exist:
//! reports up to 2020-03-22 use `Country/Region` and `Province/State`, later
//! ones `Country_Region` and `Province_State` along with extra columns
//! (FIPS, Admin2, coordinates) that are ignored here.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use itertools::Itertools;
use log::{debug, info};
use serde::Deserialize;

use crate::dataset::Dataset;
use crate::error::{Error, Result};

const REPORT_NAME_FORMAT: &str = "%m-%d-%Y";

/// Country names that appear under more than one spelling across reports.
const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("United Kingdom", "UK"),
    ("Mainland China", "China"),
    ("Korea, South", "South Korea"),
];

/// Which part of a country a report row covers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    /// The row already holds the total for the whole country.
    CountryTotal,
    /// The row covers a single province or state.
    Province(String),
}

/// One row of a daily report after column and name normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    pub country: String,
    pub region: Region,
    pub confirmed: i64,
    pub deaths: i64,
    pub recovered: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "Country/Region", alias = "Country_Region")]
    country: String,
    #[serde(rename = "Province/State", alias = "Province_State", default)]
    province: Option<String>,
    #[serde(rename = "Confirmed", default)]
    confirmed: Option<f64>,
    #[serde(rename = "Deaths", default)]
    deaths: Option<f64>,
    #[serde(rename = "Recovered", default)]
    recovered: Option<f64>,
}

impl RawRecord {
    fn into_row(self, date: NaiveDate) -> ReportRow {
        let region = match self.province {
            Some(p) if !p.trim().is_empty() => Region::Province(p.trim().to_string()),
            _ => Region::CountryTotal,
        };
        ReportRow {
            country: canonical_country(&self.country),
            region,
            confirmed: count(self.confirmed),
            deaths: count(self.deaths),
            recovered: count(self.recovered),
            date,
        }
    }
}

fn count(v: Option<f64>) -> i64 {
    v.filter(|x| x.is_finite()).map(|x| x as i64).unwrap_or(0)
}

/// Map alias spellings onto the name used throughout the dataset.
pub fn canonical_country(name: &str) -> String {
    let name = name.trim();
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Date encoded in a report file name, or `None` if the name does not follow
/// the `MM-DD-YYYY.csv` convention.
pub fn report_date(path: &Path) -> Option<NaiveDate> {
    if path.extension()?.to_str()? != "csv" {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.len() != 10 {
        return None;
    }
    NaiveDate::parse_from_str(stem, REPORT_NAME_FORMAT).ok()
}

/// All report files in `dir`, ordered by the date in their name.
pub fn report_files(dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>> {
    if !dir.is_dir() {
        return Err(Error::MissingReports(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match report_date(&path) {
            Some(date) => files.push((date, path)),
            None => debug!("Skipping {}: not a daily report", path.display()),
        }
    }
    if files.is_empty() {
        return Err(Error::NoReports(dir.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Parse one report file, keeping province rows.
pub fn read_report(path: &Path, date: NaiveDate) -> Result<Vec<ReportRow>> {
    let bad = |source: csv::Error| Error::BadReport {
        path: path.to_path_buf(),
        source,
    };
    let text = std::fs::read_to_string(path).map_err(|e| bad(e.into()))?;
    // Early reports start with a byte order mark that would end up in the first header.
    let text = text.trim_start_matches('\u{feff}');
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    rdr.deserialize::<RawRecord>()
        .map(|rec| rec.map(|r| r.into_row(date)).map_err(bad))
        .collect()
}

/// Fold the rows of a single report into one `CountryTotal` row per country.
///
/// Countries that only report provinces get a synthetic total summing their
/// provinces. Countries that already carry a total keep it (several totals
/// after name harmonization are summed).
pub fn country_totals(rows: Vec<ReportRow>) -> Vec<ReportRow> {
    rows.into_iter()
        .into_group_map_by(|r| (r.date, r.country.clone()))
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|((date, country), rows)| {
            let has_total = rows.iter().any(|r| r.region == Region::CountryTotal);
            if !has_total {
                debug!("{} on {}: summing {} provinces", country, date, rows.len());
            }
            let (confirmed, deaths, recovered) = rows
                .iter()
                .filter(|r| !has_total || r.region == Region::CountryTotal)
                .fold((0, 0, 0), |(c, d, r), row| {
                    (c + row.confirmed, d + row.deaths, r + row.recovered)
                });
            ReportRow {
                country,
                region: Region::CountryTotal,
                confirmed,
                deaths,
                recovered,
                date,
            }
        })
        .collect()
}

/// Read every daily report in `dir` into one date-ordered dataset.
pub fn load_reports(dir: &Path) -> Result<Dataset> {
    let files = report_files(dir)?;
    info!("Ingesting {} daily reports from {}", files.len(), dir.display());
    let mut rows = Vec::new();
    for (date, path) in &files {
        rows.extend(country_totals(read_report(path, *date)?));
    }
    Ok(Dataset::from_rows(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, d).unwrap()
    }

    fn row(country: &str, region: Region, confirmed: i64) -> ReportRow {
        ReportRow {
            country: country.to_string(),
            region,
            confirmed,
            deaths: 1,
            recovered: 2,
            date: day(3, 1),
        }
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_report_date() {
        assert_eq!(report_date(Path::new("a/03-01-2020.csv")), Some(day(3, 1)));
        assert_eq!(report_date(Path::new("README.md")), None);
        assert_eq!(report_date(Path::new("3-1-2020.csv")), None);
        assert_eq!(report_date(Path::new("13-01-2020.csv")), None);
    }

    #[test]
    fn test_canonical_country() {
        assert_eq!(canonical_country("United Kingdom"), "UK");
        assert_eq!(canonical_country(" Mainland China "), "China");
        assert_eq!(canonical_country("Korea, South"), "South Korea");
        assert_eq!(canonical_country("Germany"), "Germany");
    }

    #[test]
    fn test_provinces_are_summed_when_no_total() {
        let rows = vec![
            row("Australia", Region::Province("Victoria".into()), 10),
            row("Australia", Region::Province("Queensland".into()), 5),
        ];
        let totals = country_totals(rows);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].region, Region::CountryTotal);
        assert_eq!(totals[0].confirmed, 15);
        assert_eq!(totals[0].deaths, 2);
        assert_eq!(totals[0].recovered, 4);
    }

    #[test]
    fn test_existing_total_is_kept() {
        let rows = vec![
            row("France", Region::CountryTotal, 100),
            row("France", Region::Province("Reunion".into()), 3),
        ];
        let totals = country_totals(rows);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].confirmed, 100);
    }

    #[test]
    fn test_harmonized_duplicates_merge() {
        let rows = vec![
            row("UK", Region::CountryTotal, 7),
            row("UK", Region::CountryTotal, 3),
            row("Italy", Region::CountryTotal, 1),
        ];
        let totals = country_totals(rows);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].country, "Italy");
        assert_eq!(totals[1].confirmed, 10);
    }

    #[test]
    fn test_read_old_header_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "03-01-2020.csv",
            "\u{feff}Province/State,Country/Region,Last Update,Confirmed,Deaths,Recovered\n\
             Hubei,Mainland China,2020-03-01T10:13:19,66907,2761,31536\n\
             ,Italy,2020-03-01T23:23:02,1694,34,83\n\
             ,United Kingdom,2020-03-01T23:23:02,36,,8\n",
        );
        let rows = read_report(&path, day(3, 1)).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].country, "China");
        assert_eq!(rows[0].region, Region::Province("Hubei".into()));
        assert_eq!(rows[1].region, Region::CountryTotal);
        assert_eq!(rows[2].country, "UK");
        assert_eq!(rows[2].deaths, 0);
    }

    #[test]
    fn test_read_new_header_convention() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "03-23-2020.csv",
            "FIPS,Admin2,Province_State,Country_Region,Last_Update,Lat,Long_,Confirmed,Deaths,Recovered,Active,Combined_Key\n\
             36061,New York City,New York,US,3/23/20 23:19,40.76,-73.97,12305,99,0,0,\"New York City, New York, US\"\n\
             ,,,\"Korea, South\",3/23/20 23:19,35.9,127.7,8961,111,3166,5684,\"Korea, South\"\n",
        );
        let rows = read_report(&path, day(3, 23)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].country, "US");
        assert_eq!(rows[0].confirmed, 12305);
        assert_eq!(rows[1].country, "South Korea");
        assert_eq!(rows[1].region, Region::CountryTotal);
    }

    #[test]
    fn test_missing_directory() {
        let err = report_files(Path::new("/nonexistent/reports")).unwrap_err();
        assert!(matches!(err, Error::MissingReports(_)));
    }

    #[test]
    fn test_directory_without_reports() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "README.md", "# notes\n");
        let err = report_files(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NoReports(_)));
    }

    #[test]
    fn test_unparseable_report_names_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "03-01-2020.csv", "Country/Region,Confirmed\nItaly,lots\n");
        let err = load_reports(dir.path()).unwrap_err();
        match err {
            Error::BadReport { path, .. } => assert!(path.ends_with("03-01-2020.csv")),
            e => panic!("unexpected error {:?}", e),
        }
    }
}
