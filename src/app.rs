use std::path::PathBuf;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::capacity::CountryProfile;
use crate::chart::{colorblind_palette, ChartStyle, Scale};
use crate::config::Settings;
use crate::dataset::Dataset;
use crate::error::Error;
use crate::plots::{self, PlotKind, PlotParams};
use crate::report;
use crate::series::shift_date;

/// Read the cached dataset, or rebuild it from the daily reports and
/// rewrite the cache when `rebuild` is set.
pub fn load_dataset(settings: &Settings, rebuild: bool) -> Result<Dataset> {
    let data = if rebuild {
        let data = report::load_reports(&settings.reports_dir)?;
        data.write_cache(&settings.cache)
            .with_context(|| format!("writing {}", settings.cache.display()))?;
        data
    } else {
        Dataset::read_cache(&settings.cache)?
    };
    info!("{} country rows for {} countries", data.len(), data.countries().len());
    Ok(data)
}

/// Profiles for `names` that have data, with the reserved ICU beds taken off.
fn selection(data: &Dataset, settings: &Settings, names: &[String]) -> Result<Vec<CountryProfile>> {
    let mut selected = Vec::new();
    for name in names {
        let profile = settings
            .profile(name)
            .ok_or_else(|| Error::UnknownProfile(name.clone()))?;
        if data.country(name).is_err() {
            warn!("Leaving out {}: not in the dataset", name);
            continue;
        }
        selected.push(profile.with_reserved_icu(settings.constants.reserved_icu_per_capita));
    }
    Ok(selected)
}

pub fn plot_all(data: &Dataset, settings: &Settings, style: &ChartStyle) -> Result<Vec<PathBuf>> {
    let last = data.last_date().ok_or(Error::InsufficientPoints { needed: 1, found: 0 })?;
    let constants = &settings.constants;
    let out = settings.out_dir.as_path();
    if !out.is_dir() {
        return Err(Error::MissingOutputDir(out.to_path_buf()).into());
    }
    let mut written = Vec::new();

    let all_names: Vec<String> = settings.profiles.iter().map(|p| p.name.clone()).collect();
    let countries = selection(data, settings, &all_names)?;
    let cases = PlotParams {
        avg: 5,
        date_lim: Some((settings.start, shift_date(last, settings.forecast)?)),
        scale: Some(Scale::Log),
        forecast: settings.forecast,
        extrapolation_base: settings.extrapolation_base,
    };
    for kind in [
        PlotKind::NewInfections,
        PlotKind::Confirmed,
        PlotKind::EstimatedFromDeaths,
        PlotKind::EstimatedFromDelay,
        PlotKind::DeathRate,
        PlotKind::Deaths,
    ] {
        written.push(plots::plot(kind, data, &countries, &cases, constants, style, out)?);
    }

    for country in selection(data, settings, &settings.detected_fraction_countries)? {
        let params = PlotParams {
            date_lim: None,
            scale: None,
            ..cases.clone()
        };
        written.push(plots::plot(
            PlotKind::DetectedFraction,
            data,
            std::slice::from_ref(&country),
            &params,
            constants,
            style,
            out,
        )?);
    }

    let rate_countries = selection(data, settings, &settings.rate_countries)?;
    let spread = PlotParams {
        avg: settings.spread_rate_avg,
        date_lim: Some((settings.start, last)),
        scale: None,
        ..cases.clone()
    };
    written.push(plots::plot(PlotKind::SpreadRate, data, &rate_countries, &spread, constants, style, out)?);
    let infection = PlotParams {
        avg: settings.infection_rate_avg,
        date_lim: Some((settings.infection_rate_start, last)),
        ..spread
    };
    written.push(plots::plot(
        PlotKind::InfectionRate,
        data,
        &rate_countries,
        &infection,
        constants,
        style,
        out,
    )?);

    info!("Wrote {} charts to {}", written.len(), out.display());
    Ok(written)
}

pub fn run(settings: &Settings, rebuild: bool, plot: bool) -> Result<()> {
    let data = load_dataset(settings, rebuild)?;
    if data.is_empty() {
        warn!("{} holds no country rows", settings.cache.display());
    }
    if let Some(last) = data.last_date() {
        println!("Last data is from {}", last);
    }
    if plot {
        let style = ChartStyle {
            palette: colorblind_palette(settings.profiles.len(), 1.0),
            ..ChartStyle::default()
        };
        plot_all(&data, settings, &style)?;
    }
    Ok(())
}
