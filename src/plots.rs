use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use log::{debug, warn};
use plotters::style::{RGBColor, BLACK};

use crate::capacity::{self, CountryProfile};
use crate::chart::{self, Chart, ChartStyle, Line, Scale};
use crate::config::Constants;
use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::series::{shift_date, CountryHistory, Series};
use crate::smoothing;

const RAW_ALPHA: f64 = 0.9;
const OVERLAY_ALPHA: f64 = 0.3;
const REFERENCE_ALPHA: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    SpreadRate,
    InfectionRate,
    NewInfections,
    Confirmed,
    EstimatedFromDeaths,
    EstimatedFromDelay,
    DeathRate,
    Deaths,
    DetectedFraction,
}

impl PlotKind {
    pub const ALL: [PlotKind; 9] = [
        PlotKind::SpreadRate,
        PlotKind::InfectionRate,
        PlotKind::NewInfections,
        PlotKind::Confirmed,
        PlotKind::EstimatedFromDeaths,
        PlotKind::EstimatedFromDelay,
        PlotKind::DeathRate,
        PlotKind::Deaths,
        PlotKind::DetectedFraction,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PlotKind::SpreadRate => "spread_rate",
            PlotKind::InfectionRate => "infection_rate",
            PlotKind::NewInfections => "new_infections",
            PlotKind::Confirmed => "confirmed",
            PlotKind::EstimatedFromDeaths => "estimated_from_deaths",
            PlotKind::EstimatedFromDelay => "estimated_from_delay",
            PlotKind::DeathRate => "deathrate",
            PlotKind::Deaths => "deaths",
            PlotKind::DetectedFraction => "fraction_tested_from_deaths",
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            PlotKind::SpreadRate => "rate",
            PlotKind::InfectionRate => "infection_rate",
            PlotKind::NewInfections => "new_infections",
            PlotKind::Confirmed => "confirmed",
            PlotKind::EstimatedFromDeaths => "estimated_deaths",
            PlotKind::EstimatedFromDelay => "estimated_delay",
            PlotKind::DeathRate => "deathrate",
            PlotKind::Deaths => "deaths",
            PlotKind::DetectedFraction => "detected_fraction",
        }
    }

    pub fn default_scale(self) -> Scale {
        match self {
            PlotKind::SpreadRate | PlotKind::InfectionRate | PlotKind::DetectedFraction => Scale::Linear,
            _ => Scale::Log,
        }
    }

    pub fn y_bounds(self) -> (f64, f64) {
        match self {
            PlotKind::SpreadRate => (0.0, 100.0),
            PlotKind::InfectionRate => (0.0, 2.0),
            PlotKind::NewInfections => (1e0, 1e3),
            PlotKind::Confirmed => (1e0, 1e4),
            PlotKind::EstimatedFromDeaths => (1e0, 1e5),
            PlotKind::EstimatedFromDelay => (1e-7, 1e-1),
            PlotKind::DeathRate => (1e-9, 1e-4),
            PlotKind::Deaths => (1e-9, 1e-1),
            PlotKind::DetectedFraction => (0.0, 1.5),
        }
    }

    pub fn single_country_only(self) -> bool {
        self == PlotKind::DetectedFraction
    }

    /// Whether the series is projected forward, which widens the default
    /// date range by the forecast horizon.
    fn extrapolated(self) -> bool {
        matches!(self, PlotKind::NewInfections | PlotKind::Confirmed)
    }
}

#[derive(Debug, Clone)]
pub struct PlotParams {
    pub avg: usize,
    /// Shown date range; derived from the data when `None`.
    pub date_lim: Option<(NaiveDate, NaiveDate)>,
    /// Overrides the plot type's default scale.
    pub scale: Option<Scale>,
    pub forecast: i64,
    pub extrapolation_base: usize,
}

impl Default for PlotParams {
    fn default() -> Self {
        PlotParams {
            avg: 5,
            date_lim: None,
            scale: None,
            forecast: 21,
            extrapolation_base: 7,
        }
    }
}

/// `<country>_<suffix>.png` for one country, `countries_<suffix>.png` for several.
pub fn file_name(kind: PlotKind, countries: &[CountryProfile]) -> String {
    let slug = match countries {
        [one] => one.name.replace(' ', "_").to_lowercase(),
        _ => "countries".to_string(),
    };
    format!("{}_{}.png", slug, kind.suffix())
}

/// Reject country selections a plot type cannot show.
pub fn validate(kind: PlotKind, data: &Dataset, countries: &[CountryProfile]) -> Result<()> {
    if countries.is_empty() {
        return Err(Error::NoCountries(kind.name()));
    }
    if kind.single_country_only() && countries.len() > 1 {
        return Err(Error::SingleCountryOnly {
            plot: kind.name(),
            count: countries.len(),
        });
    }
    for c in countries {
        data.country(&c.name)?;
    }
    Ok(())
}

pub fn plot(
    kind: PlotKind,
    data: &Dataset,
    countries: &[CountryProfile],
    params: &PlotParams,
    constants: &Constants,
    style: &ChartStyle,
    out_dir: &Path,
) -> anyhow::Result<PathBuf> {
    validate(kind, data, countries)?;
    let chart = build(kind, data, countries, params, constants, style)?;
    chart::render(&chart, style, out_dir)
}

struct Builder<'a> {
    kind: PlotKind,
    params: &'a PlotParams,
    constants: &'a Constants,
    style: &'a ChartStyle,
    single: bool,
    lines: Vec<Line>,
    references: Vec<(f64, usize)>,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

impl<'a> Builder<'a> {
    fn color(&self, index: usize) -> RGBColor {
        if self.single {
            self.style.single
        } else {
            self.style.color(index)
        }
    }

    fn extend_range(&mut self, series: &Series) {
        if let (Some(first), Some(last)) = (series.first_date(), series.last_date()) {
            self.first = Some(self.first.map_or(first, |d| d.min(first)));
            self.last = Some(self.last.map_or(last, |d| d.max(last)));
        }
    }

    /// Raw series plus its moving average, as on the rate charts.
    fn averaged(&mut self, index: usize, country: &str, series: &Series) -> Result<()> {
        self.extend_range(series);
        let color = self.color(index);
        let avg = smoothing::smooth(series, self.params.avg)?;
        self.lines.push(Line::new(defined(&avg), color, RAW_ALPHA));
        self.lines
            .push(Line::new(defined(series), color, OVERLAY_ALPHA).labelled(country));
        Ok(())
    }

    /// Series with its log-linear projection and a capacity reference.
    fn projected(&mut self, index: usize, country: &str, series: &Series, reference: f64) {
        self.extend_range(series);
        let color = self.color(index);
        self.lines
            .push(Line::new(defined(series), color, RAW_ALPHA).labelled(country));
        match smoothing::extrapolate(series, self.params.extrapolation_base, self.params.forecast) {
            Ok(ext) => self.lines.push(Line::new(defined(&ext), color, OVERLAY_ALPHA)),
            Err(e) => warn!("No {} projection for {}: {}", self.kind.name(), country, e),
        }
        self.references.push((reference, index));
    }

    fn plain(&mut self, index: usize, country: &str, series: &Series) {
        self.extend_range(series);
        let color = self.color(index);
        self.lines
            .push(Line::new(defined(series), color, RAW_ALPHA).labelled(country));
    }

    fn date_range(&self) -> Result<(NaiveDate, NaiveDate)> {
        if let Some(lim) = self.params.date_lim {
            return Ok(lim);
        }
        match (self.first, self.last) {
            (Some(first), Some(last)) if self.kind.extrapolated() => {
                Ok((first, shift_date(last, self.params.forecast)?))
            }
            (Some(first), Some(last)) => Ok((first, last)),
            _ => Err(Error::InsufficientPoints { needed: 1, found: 0 }),
        }
    }
}

fn defined(series: &Series) -> Vec<(NaiveDate, f64)> {
    series.defined().collect()
}

/// Assemble the chart description for `kind` without drawing it.
pub fn build(
    kind: PlotKind,
    data: &Dataset,
    countries: &[CountryProfile],
    params: &PlotParams,
    constants: &Constants,
    style: &ChartStyle,
) -> Result<Chart> {
    validate(kind, data, countries)?;
    let mut b = Builder {
        kind,
        params,
        constants,
        style,
        single: countries.len() == 1,
        lines: Vec::new(),
        references: Vec::new(),
        first: None,
        last: None,
    };
    let per_million = constants.per_million;
    let scale = params.scale.unwrap_or_else(|| kind.default_scale());
    let mut y_bounds = kind.y_bounds();
    let mut title = None;
    let mut icu_max: f64 = 0.0;

    for (i, profile) in countries.iter().enumerate() {
        let history = CountryHistory::extract(data, &profile.name)?;
        let pop = profile.population;
        let name = profile.name.as_str();
        debug!("{}: {} days for {}", kind.name(), history.confirmed().len(), name);
        match kind {
            PlotKind::SpreadRate => b.averaged(i, name, &history.spread_rate().map(|r| r * 100.0))?,
            PlotKind::InfectionRate => b.averaged(i, name, &history.infection_rate())?,
            PlotKind::NewInfections => {
                let icu = per_million
                    * capacity::icu_limit(
                        profile.icu_per_capita,
                        b.constants.icu_rate,
                        Some(b.constants.icu_stay_days),
                    );
                icu_max = icu_max.max(icu);
                let series = history.new_infections().map(|n| per_million * n / pop);
                b.projected(i, name, &series, icu);
            }
            PlotKind::Confirmed => {
                let icu = per_million * capacity::icu_limit(profile.icu_per_capita, b.constants.icu_rate, None);
                let series = history.confirmed().map(|c| per_million * c / pop);
                b.projected(i, name, &series, icu);
            }
            PlotKind::EstimatedFromDeaths => {
                let icu = per_million * capacity::icu_limit(profile.icu_per_capita, b.constants.icu_rate, None);
                let series = capacity::estimate_from_deaths(&history.deaths(), b.constants.death_rate, pop)
                    .map(|e| per_million * e);
                b.projected(i, name, &series, icu);
            }
            PlotKind::EstimatedFromDelay => {
                let icu = capacity::icu_limit(profile.icu_per_capita, b.constants.icu_rate, None);
                let series = capacity::estimate_from_delay(
                    &history.confirmed(),
                    pop,
                    b.constants.delay_growth,
                    b.constants.delay_days,
                );
                b.projected(i, name, &series, icu);
            }
            PlotKind::DeathRate => {
                let icu = capacity::icu_limit(
                    profile.icu_per_capita,
                    b.constants.death_icu_ratio,
                    Some(b.constants.icu_stay_days),
                );
                b.plain(i, name, &history.deaths_per_day().map(|d| d / pop));
                b.references.push((icu, i));
            }
            PlotKind::Deaths => b.plain(i, name, &history.deaths().map(|d| d / pop)),
            PlotKind::DetectedFraction => {
                let confirmed = history.confirmed();
                let deaths = history.deaths();
                b.extend_range(&confirmed);
                for (j, &offset) in b.constants.death_offsets.iter().enumerate() {
                    let fraction = capacity::detected_fraction(&confirmed, &deaths, b.constants.mortality, offset);
                    b.lines.push(
                        Line::new(defined(&fraction), b.style.color(j), RAW_ALPHA)
                            .labelled(format!("{} days till death", offset)),
                    );
                }
                title = Some(format!("Country: {}; start date limited by first death", name));
            }
        }
    }

    if kind == PlotKind::NewInfections && scale == Scale::Linear && icu_max > 0.0 {
        y_bounds = (0.0, 1.3 * icu_max);
    }

    let x_range = b.date_range()?;
    let mut lines = std::mem::take(&mut b.lines);
    for &(value, index) in &b.references {
        lines.push(Line::reference(value, x_range, b.color(index), REFERENCE_ALPHA));
    }
    if kind == PlotKind::DetectedFraction {
        lines.push(Line::new(vec![(x_range.0, 1.0), (x_range.1, 1.0)], BLACK, 1.0));
    }

    Ok(Chart {
        file_name: file_name(kind, countries),
        title,
        y_label: y_label(kind, params, constants, countries),
        scale,
        y_bounds,
        x_range,
        lines,
        legend: !b.single || matches!(kind, PlotKind::SpreadRate | PlotKind::InfectionRate | PlotKind::DetectedFraction),
    })
}

fn y_label(kind: PlotKind, params: &PlotParams, constants: &Constants, countries: &[CountryProfile]) -> String {
    let label = match kind {
        PlotKind::SpreadRate => format!("daily spread rate (and its {} days average) [%]", params.avg),
        PlotKind::InfectionRate => format!("relative new infections (and {} days average)", params.avg),
        PlotKind::DetectedFraction => "Fraction of detected cases".to_string(),
        PlotKind::NewInfections => "new infections per 1,000,000 capita".to_string(),
        PlotKind::Confirmed => "confirmed cases per 1,000,000 capita".to_string(),
        PlotKind::EstimatedFromDeaths => format!(
            "estimated cases per 1,000,000 capita based on {}% death rate",
            100.0 * constants.death_rate
        ),
        PlotKind::EstimatedFromDelay => "estimated cases per capita based on delay".to_string(),
        PlotKind::DeathRate => "deathrate per capita".to_string(),
        PlotKind::Deaths => "deaths per capita".to_string(),
    };
    // rate charts always carry a legend, the detected fraction chart a title
    let names_country = !matches!(
        kind,
        PlotKind::SpreadRate | PlotKind::InfectionRate | PlotKind::DetectedFraction
    );
    match countries {
        [one] if names_country => format!("{} ({})", label, one.name),
        _ => label,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{Region, ReportRow};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 3, d).unwrap()
    }

    fn dataset() -> Dataset {
        let mut rows = Vec::new();
        for (country, scale) in [("Germany", 1), ("South Korea", 2)] {
            for d in 1..=10u32 {
                rows.push(ReportRow {
                    country: country.to_string(),
                    region: Region::CountryTotal,
                    confirmed: scale * 100 * 2i64.pow(d),
                    deaths: scale * (d as i64),
                    recovered: 0,
                    date: day(d),
                });
            }
        }
        Dataset::from_rows(rows)
    }

    fn profiles() -> Vec<CountryProfile> {
        vec![
            CountryProfile::new("Germany", 1e6, 30.0),
            CountryProfile::new("South Korea", 2e6, 10.0),
        ]
    }

    fn params() -> PlotParams {
        PlotParams {
            forecast: 3,
            extrapolation_base: 4,
            ..PlotParams::default()
        }
    }

    #[test]
    fn test_file_names() {
        let p = profiles();
        assert_eq!(file_name(PlotKind::SpreadRate, &p[1..]), "south_korea_rate.png");
        assert_eq!(file_name(PlotKind::Confirmed, &p), "countries_confirmed.png");
        assert_eq!(file_name(PlotKind::EstimatedFromDeaths, &p[..1]), "germany_estimated_deaths.png");
    }

    #[test]
    fn test_every_kind_has_its_own_file() {
        let p = profiles();
        let names: std::collections::HashSet<String> =
            PlotKind::ALL.iter().map(|k| file_name(*k, &p[..1])).collect();
        assert_eq!(names.len(), PlotKind::ALL.len());
        for kind in PlotKind::ALL {
            let (lo, hi) = kind.y_bounds();
            assert!(lo < hi);
            if kind.default_scale() == Scale::Log {
                assert!(lo > 0.0, "{} needs a positive lower bound", kind.name());
            }
        }
    }

    #[test]
    fn test_detected_fraction_rejects_several_countries() {
        let dir = tempfile::tempdir().unwrap();
        let err = plot(
            PlotKind::DetectedFraction,
            &dataset(),
            &profiles(),
            &params(),
            &Constants::default(),
            &ChartStyle::default(),
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::SingleCountryOnly { count: 2, .. })
        ));
        assert!(err.to_string().contains("unreadable for multiple countries"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unknown_country_rejected() {
        let err = validate(PlotKind::Confirmed, &dataset(), &[CountryProfile::new("Atlantis", 1.0, 1.0)]);
        assert!(matches!(err, Err(Error::UnknownCountry(_))));
    }

    #[test]
    fn test_confirmed_chart_layers() {
        let p = profiles();
        let chart = build(
            PlotKind::Confirmed,
            &dataset(),
            &p[..1],
            &params(),
            &Constants::default(),
            &ChartStyle::default(),
        )
        .unwrap();
        assert_eq!(chart.file_name, "germany_confirmed.png");
        assert_eq!(chart.scale, Scale::Log);
        assert_eq!(chart.x_range, (day(1), day(13)));
        // raw, projection, reference
        assert_eq!(chart.lines.len(), 3);
        assert_eq!(chart.lines[0].points.len(), 10);
        assert_eq!(chart.lines[0].points[0], (day(1), 200.0));
        assert_eq!(chart.lines[1].points.first().unwrap().0, day(6));
        assert_eq!(chart.lines[1].points.last().unwrap().0, day(13));
        let icu = 1e6 * 30e-5 / 0.06;
        assert!(chart.lines[2].dashed);
        assert!((chart.lines[2].points[0].1 - icu).abs() < 1e-6);
        assert!(!chart.legend);
        assert!(chart.y_label.ends_with("(Germany)"));
    }

    #[test]
    fn test_spread_rate_chart_has_average_and_raw() {
        let chart = build(
            PlotKind::SpreadRate,
            &dataset(),
            &profiles(),
            &PlotParams { avg: 3, ..params() },
            &Constants::default(),
            &ChartStyle::default(),
        )
        .unwrap();
        assert_eq!(chart.lines.len(), 4);
        // confirmed doubles every day: 100 % growth
        assert!(chart.lines[1].points.iter().all(|(_, v)| (*v - 100.0).abs() < 1e-9));
        assert_eq!(chart.lines[1].label.as_deref(), Some("Germany"));
        assert_eq!(chart.x_range, (day(1), day(9)));
        assert!(chart.legend);
    }

    #[test]
    fn test_linear_new_infections_bounds_follow_icu() {
        let chart = build(
            PlotKind::NewInfections,
            &dataset(),
            &profiles(),
            &PlotParams { scale: Some(Scale::Linear), ..params() },
            &Constants::default(),
            &ChartStyle::default(),
        )
        .unwrap();
        let icu = 1e6 * 30e-5 / 0.06 / 18.0;
        assert_eq!(chart.y_bounds.0, 0.0);
        assert!((chart.y_bounds.1 - 1.3 * icu).abs() < 1e-9);
    }

    #[test]
    fn test_detected_fraction_chart() {
        let p = profiles();
        let chart = build(
            PlotKind::DetectedFraction,
            &dataset(),
            &p[..1],
            &params(),
            &Constants::default(),
            &ChartStyle::default(),
        )
        .unwrap();
        // eight offsets plus the line at 1.0
        assert_eq!(chart.lines.len(), 9);
        assert_eq!(chart.lines[0].label.as_deref(), Some("7 days till death"));
        assert_eq!(chart.lines[0].points.len(), 3);
        assert!(chart.lines[7].points.is_empty());
        assert_eq!(chart.title.as_deref(), Some("Country: Germany; start date limited by first death"));
    }

    #[test]
    fn test_projection_skipped_on_non_positive_values() {
        let rows = (1..=5u32)
            .map(|d| ReportRow {
                country: "Japan".to_string(),
                region: Region::CountryTotal,
                confirmed: 10,
                deaths: 0,
                recovered: 0,
                date: day(d),
            })
            .collect();
        let chart = build(
            PlotKind::NewInfections,
            &Dataset::from_rows(rows),
            &[CountryProfile::new("Japan", 1e6, 4.5)],
            &params(),
            &Constants::default(),
            &ChartStyle::default(),
        )
        .unwrap();
        // no new infections: raw line and reference only
        assert_eq!(chart.lines.len(), 2);
        assert!(chart.lines[1].dashed);
    }
}
