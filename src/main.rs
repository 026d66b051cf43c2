use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

use kovid::config::{self, Settings};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "kovid",
    about = "Merge the JHU CSSE daily COVID-19 reports and chart them per country"
)]
struct Opt {
    #[structopt(short, long, help = "Generate data.csv from the daily reports")]
    data: bool,
    #[structopt(short, long, help = "Generate all the plots")]
    plot: bool,
    #[structopt(
        long,
        parse(from_os_str),
        default_value = "COVID-19/csse_covid_19_data/csse_covid_19_daily_reports/",
        help = "Directory with the MM-DD-YYYY.csv daily reports"
    )]
    reports: PathBuf,
    #[structopt(long, parse(from_os_str), default_value = "data.csv", help = "Merged dataset cache")]
    cache: PathBuf,
    #[structopt(long, parse(from_os_str), default_value = "png", help = "Directory the charts are written to")]
    out: PathBuf,
    #[structopt(long, default_value = "14", help = "Days to extrapolate past the last report")]
    forecast: i64,
    #[structopt(long, default_value = "6", help = "Days the extrapolation is fit to")]
    extrapolation_base: usize,
    #[structopt(long, parse(try_from_str = parse_date), help = "First date on the case charts (%Y-%m-%d format)")]
    start: Option<chrono::NaiveDate>,
    #[structopt(
        long,
        parse(from_os_str),
        help = "CSV with Country,Population,IcuBedsPer100k columns replacing the built-in countries"
    )]
    countries: Option<PathBuf>,
}

fn parse_date(s: &str) -> Result<chrono::NaiveDate, chrono::ParseError> {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
}

fn settings(opt: Opt) -> Result<Settings> {
    let mut settings = Settings {
        reports_dir: opt.reports,
        cache: opt.cache,
        out_dir: opt.out,
        forecast: opt.forecast,
        extrapolation_base: opt.extrapolation_base,
        ..Settings::default()
    };
    if let Some(start) = opt.start {
        settings.start = start;
    }
    if let Some(path) = opt.countries {
        settings.profiles = config::load_profiles(&path)?;
        let known: Vec<String> = settings.profiles.iter().map(|p| p.name.clone()).collect();
        settings.detected_fraction_countries.retain(|c| known.contains(c));
        settings.rate_countries.retain(|c| known.contains(c));
    }
    settings.validate()?;
    Ok(settings)
}

fn main() {
    env_logger::init();
    let opt = Opt::from_args();
    let rebuild = opt.data;
    let plot = opt.plot;
    let res = settings(opt).and_then(|s| kovid::app::run(&s, rebuild, plot));
    if let Err(e) = res {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
