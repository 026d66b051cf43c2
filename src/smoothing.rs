use chrono::NaiveDate;
use itertools::Itertools;
use nalgebra::{DMatrix, DVector};

use crate::error::{Error, Result};
use crate::series::{shift_date, Series};

/// Trailing moving average over `window` points.
///
/// The first `window - 1` outputs average only the points seen so far
/// (index 0 is the value itself), after that every output is the mean of
/// the last `window` points.
pub fn moving_average(data: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(Error::InvalidWindow);
    }
    let mut sum = 0.0;
    Ok(data
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            sum += v;
            if i >= window {
                sum -= data[i - window];
            }
            sum / (i + 1).min(window) as f64
        })
        .collect())
}

/// Moving average of the defined values of `series`.
///
/// A gap ends the window: each run of defined values is averaged on its own,
/// ramp-up included, so no average spans an undefined day. Gaps are left out
/// of the result.
pub fn smooth(series: &Series, window: usize) -> Result<Series> {
    let mut smoothed = Vec::with_capacity(series.len());
    let runs = series.points().iter().chunk_by(|p| p.value.is_some());
    for (defined, run) in &runs {
        if !defined {
            continue;
        }
        let (dates, values): (Vec<NaiveDate>, Vec<f64>) =
            run.filter_map(|p| p.value.map(|v| (p.date, v))).unzip();
        smoothed.extend(dates.into_iter().zip(moving_average(&values, window)?));
    }
    Ok(Series::from_values(smoothed))
}

/// `f(x) = 10^(slope * x + intercept)`, fit by least squares in log10 space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogLinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LogLinearFit {
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        if xs.len() != ys.len() || xs.len() < 2 {
            return Err(Error::InsufficientPoints {
                needed: 2,
                found: xs.len().min(ys.len()),
            });
        }
        if let Some((index, &value)) = ys.iter().enumerate().find(|(_, y)| !(**y > 0.0)) {
            return Err(Error::NonPositive { index, value });
        }
        if xs.iter().all_equal() {
            return Err(Error::InsufficientPoints { needed: 2, found: 1 });
        }
        let x = DMatrix::from_fn(xs.len(), 2, |i, j| if j == 0 { xs[i] } else { 1.0 });
        let y = DVector::from_iterator(ys.len(), ys.iter().map(|v| v.log10()));
        let beta = solve_least_squares(&x, &y).ok_or(Error::IllConditioned)?;
        Ok(LogLinearFit {
            slope: beta[0],
            intercept: beta[1],
        })
    }

    pub fn eval(&self, x: f64) -> f64 {
        10f64.powf(self.slope * x + self.intercept)
    }
}

/// SVD least squares, loosening the tolerance until a finite solution comes out.
fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);
    for &tol in &[1e-10, 1e-8, 1e-6] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }
    None
}

/// Project `series` forward by `forecast` days from a fit over its last
/// `base` defined values.
///
/// The fitted samples sit at x = 0..base-1 with the last one on the final
/// date, and the curve is evaluated daily from `base` days before the final
/// date to `forecast` days after it.
pub fn extrapolate(series: &Series, base: usize, forecast: i64) -> Result<Series> {
    let defined: Vec<(NaiveDate, f64)> = series.defined().collect();
    if base < 2 || defined.len() < base {
        return Err(Error::InsufficientPoints {
            needed: base.max(2),
            found: defined.len(),
        });
    }
    let tail = &defined[defined.len() - base..];
    let xs: Vec<f64> = (0..base).map(|x| x as f64).collect();
    let ys: Vec<f64> = tail.iter().map(|(_, v)| *v).collect();
    let fit = LogLinearFit::fit(&xs, &ys)?;

    let last = tail[base - 1].0;
    shift_date(last, forecast)?;
    let offset = base as i64 - 1;
    let points = (-(base as i64)..=forecast)
        .map(|d| -> Result<(NaiveDate, f64)> {
            Ok((shift_date(last, d)?, fit.eval((d + offset) as f64)))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Series::from_values(points))
}
