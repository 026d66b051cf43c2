//! PNG rendering of chart descriptions with plotters.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use log::info;
use palette::{Desaturate, FromColor, Hsl, Srgb};
use plotters::prelude::*;
use plotters::series::DashedLineSeries;

use crate::error::Error;

/// seaborn's "colorblind" palette.
const COLORBLIND: [(u8, u8, u8); 10] = [
    (0x01, 0x73, 0xb2),
    (0xde, 0x8f, 0x05),
    (0x02, 0x9e, 0x73),
    (0xd5, 0x5e, 0x00),
    (0xcc, 0x78, 0xbc),
    (0xca, 0x91, 0x61),
    (0xfb, 0xaf, 0xe4),
    (0x94, 0x94, 0x94),
    (0xec, 0xe1, 0x33),
    (0x56, 0xb4, 0xe9),
];

/// `n` colors from the colorblind palette, cycling if needed, with their
/// saturation scaled by `desat` (1.0 keeps them as they are).
pub fn colorblind_palette(n: usize, desat: f32) -> Vec<RGBColor> {
    COLORBLIND
        .iter()
        .cycle()
        .take(n)
        .map(|&(r, g, b)| {
            let rgb: Srgb = Srgb::new(r, g, b).into_format();
            let hsl: Hsl = Hsl::from_color(rgb);
            let hsl = hsl.desaturate(1.0 - desat.clamp(0.0, 1.0));
            let out: Srgb = Srgb::from_color(hsl);
            let out = out.into_format::<u8>();
            RGBColor(out.red, out.green, out.blue)
        })
        .collect()
}

/// Figure-wide look shared by every chart of a run.
#[derive(Debug, Clone)]
pub struct ChartStyle {
    pub size: (u32, u32),
    pub font: String,
    pub caption_size: u32,
    pub label_size: u32,
    pub x_labels: usize,
    pub palette: Vec<RGBColor>,
    /// Color of the data when a chart shows a single country.
    pub single: RGBColor,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            size: (1024, 640),
            font: "sans-serif".to_string(),
            caption_size: 24,
            label_size: 14,
            x_labels: 12,
            palette: colorblind_palette(11, 1.0),
            single: BLACK,
        }
    }
}

impl ChartStyle {
    pub fn color(&self, index: usize) -> RGBColor {
        if self.palette.is_empty() {
            return self.single;
        }
        self.palette[index % self.palette.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Log,
}

impl Scale {
    /// Axis position of `v`, or `None` if it cannot be shown on this scale.
    pub fn project(self, v: f64) -> Option<f64> {
        match self {
            Scale::Linear => Some(v).filter(|x| x.is_finite()),
            Scale::Log if v > 0.0 && v.is_finite() => Some(v.log10()),
            Scale::Log => None,
        }
    }

    /// Tick label for the axis position `pos`.
    pub fn format_tick(self, pos: f64) -> String {
        match self {
            Scale::Linear => format_number(pos),
            Scale::Log => format_number(10f64.powf(pos)),
        }
    }
}

fn format_number(v: f64) -> String {
    if v == 0.0 {
        return "0".to_string();
    }
    let abs = v.abs();
    if !(1e-3..1e6).contains(&abs) {
        return format!("{:.0e}", v);
    }
    let s = format!("{:.3}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub points: Vec<(NaiveDate, f64)>,
    pub color: RGBColor,
    pub alpha: f64,
    pub width: u32,
    pub dashed: bool,
    pub label: Option<String>,
}

impl Line {
    pub fn new(points: Vec<(NaiveDate, f64)>, color: RGBColor, alpha: f64) -> Self {
        Line {
            points,
            color,
            alpha,
            width: 2,
            dashed: false,
            label: None,
        }
    }

    /// A horizontal dashed line at `value` across `range`.
    pub fn reference(value: f64, range: (NaiveDate, NaiveDate), color: RGBColor, alpha: f64) -> Self {
        Line {
            dashed: true,
            ..Line::new(vec![(range.0, value), (range.1, value)], color, alpha)
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub file_name: String,
    pub title: Option<String>,
    pub y_label: String,
    pub scale: Scale,
    pub y_bounds: (f64, f64),
    pub x_range: (NaiveDate, NaiveDate),
    pub lines: Vec<Line>,
    pub legend: bool,
}

impl Chart {
    /// Runs of consecutive points of `line` that fall inside the chart area,
    /// in axis coordinates.
    pub fn segments(&self, line: &Line) -> Vec<Vec<(NaiveDate, f64)>> {
        let (lo, hi) = self.y_axis();
        let mut segments = Vec::new();
        let mut current = Vec::new();
        for &(date, v) in &line.points {
            let inside = date >= self.x_range.0 && date <= self.x_range.1;
            match self.scale.project(v).filter(|y| inside && *y >= lo && *y <= hi) {
                Some(y) => current.push((date, y)),
                None if !current.is_empty() => segments.push(std::mem::take(&mut current)),
                None => {}
            }
        }
        if !current.is_empty() {
            segments.push(current);
        }
        segments
    }

    fn y_axis(&self) -> (f64, f64) {
        let lo = self.scale.project(self.y_bounds.0).unwrap_or(0.0);
        let hi = self.scale.project(self.y_bounds.1).unwrap_or(lo + 1.0);
        (lo, hi)
    }
}

/// Draw `chart` into `out_dir`, returning the path of the PNG file.
pub fn render(chart: &Chart, style: &ChartStyle, out_dir: &Path) -> Result<PathBuf> {
    if !out_dir.is_dir() {
        return Err(Error::MissingOutputDir(out_dir.to_path_buf()).into());
    }
    let path = out_dir.join(&chart.file_name);
    draw(chart, style, &path).with_context(|| format!("failed to render {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(path)
}

fn draw(chart: &Chart, style: &ChartStyle, path: &Path) -> Result<()> {
    let (y_lo, y_hi) = chart.y_axis();
    let scale = chart.scale;
    let font = style.font.as_str();

    let root = BitMapBackend::new(path, style.size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder
        .margin(15)
        .set_label_area_size(LabelAreaPosition::Left, 80)
        .set_label_area_size(LabelAreaPosition::Bottom, 100);
    if let Some(title) = &chart.title {
        builder.caption(title, (font, style.caption_size));
    }
    let mut ctx = builder.build_cartesian_2d(chart.x_range.0..chart.x_range.1, y_lo..y_hi)?;

    let y_labels = match scale {
        Scale::Log => ((y_hi - y_lo).round() as usize + 1).max(2),
        Scale::Linear => 10,
    };
    let date_style = (font, style.label_size)
        .into_font()
        .transform(FontTransform::Rotate90)
        .color(&BLACK);
    ctx.configure_mesh()
        .x_labels(style.x_labels)
        .y_labels(y_labels)
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .y_label_formatter(&move |v: &f64| scale.format_tick(*v))
        .x_label_style(date_style)
        .y_label_style((font, style.label_size))
        .y_desc(chart.y_label.as_str())
        .axis_desc_style((font, style.label_size))
        .draw()?;

    for line in &chart.lines {
        let shape = line.color.mix(line.alpha).stroke_width(line.width);
        if let Some(label) = &line.label {
            let legend_style = shape.clone();
            ctx.draw_series(LineSeries::new(std::iter::empty::<(NaiveDate, f64)>(), shape))?
                .label(label.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], legend_style.clone()));
        }
        for segment in chart.segments(line) {
            if line.dashed {
                ctx.draw_series(DashedLineSeries::new(segment, 10, 6, shape))?;
            } else {
                ctx.draw_series(LineSeries::new(segment, shape))?;
            }
        }
    }

    if chart.legend {
        ctx.configure_series_labels()
            .border_style(&BLACK)
            .background_style(&WHITE.mix(0.8))
            .label_font((font, style.label_size))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()?;
    }
    root.present()?;
    Ok(())
}
