//! Trend lines for pivot tables.

use crate::models::{Cell, PivotTable};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// A fitted polynomial.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Highest degree first.
    pub coefficients: Vec<f64>,
    /// Sum of squared residuals over the fitted points.
    pub residual: f64,
}

impl Polynomial {
    pub fn eval(&self, x: f64) -> f64 {
        self.coefficients.iter().fold(0.0_f64, |acc, c| acc * x + c)
    }

    /// Coefficient of the linear term.
    pub fn slope(&self) -> f64 {
        match self.coefficients.len() {
            0 | 1 => 0.0,
            n => self.coefficients[n - 2],
        }
    }

    pub fn intercept(&self) -> f64 {
        self.coefficients.last().copied().unwrap_or(0.0)
    }
}

impl Serialize for Polynomial {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Polynomial", 4)?;
        state.serialize_field("coefficients", &self.coefficients)?;
        state.serialize_field("slope", &self.slope())?;
        state.serialize_field("intercept", &self.intercept())?;
        state.serialize_field("residual", &self.residual)?;
        state.end()
    }
}

/// Fits a curve through points.
pub trait CurveFitter {
    /// `None` when the points do not determine a curve.
    fn fit(&self, xs: &[f64], ys: &[f64]) -> Option<Polynomial>;
}

/// Ordinary least squares straight line.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastSquares;

impl CurveFitter for LeastSquares {
    fn fit(&self, xs: &[f64], ys: &[f64]) -> Option<Polynomial> {
        let n = xs.len().min(ys.len());
        if n < 2 {
            return None;
        }
        let (xs, ys) = (&xs[..n], &ys[..n]);

        let mean_x = xs.iter().sum::<f64>() / n as f64;
        let mean_y = ys.iter().sum::<f64>() / n as f64;

        let mut num = 0.0_f64;
        let mut den = 0.0_f64;
        for (x, y) in xs.iter().zip(ys) {
            let dx = x - mean_x;
            num += dx * (y - mean_y);
            den += dx * dx;
        }
        if den.abs() <= f64::EPSILON {
            return None;
        }

        let slope = num / den;
        let intercept = mean_y - slope * mean_x;
        let residual = xs
            .iter()
            .zip(ys)
            .map(|(x, y)| (y - (slope * x + intercept)).powi(2))
            .sum::<f64>();

        Some(Polynomial {
            coefficients: vec![slope, intercept],
            residual,
        })
    }
}

/// Pivot table with fitted columns appended.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedTable {
    /// One per data column of the source table.
    pub polynomials: Vec<Option<Polynomial>>,
    pub table: PivotTable,
}

/// Fit every data column of `table` and build the overlay table.
///
/// Returns `None` when the variable column is not entirely numeric.
pub fn build_fitted_overlay<C: CurveFitter + ?Sized>(table: &PivotTable, fitter: &C) -> Option<FittedTable> {
    let xs = table.numeric_x()?;

    let polynomials: Vec<Option<Polynomial>> = (1..=table.series_count())
        .map(|col| {
            let (px, py): (Vec<f64>, Vec<f64>) = xs
                .iter()
                .zip(&table.rows)
                .filter_map(|(x, row)| row.get(col).and_then(Cell::as_f64).map(|y| (*x, y)))
                .unzip();
            fitter.fit(&px, &py)
        })
        .collect();

    let mut headers = table.headers.clone();
    headers.extend(table.headers.iter().skip(1).cloned());

    let rows = table
        .rows
        .iter()
        .zip(&xs)
        .map(|(row, x)| {
            let mut out = row.clone();
            out.extend(polynomials.iter().map(|p| match p {
                Some(p) => Cell::Float(p.eval(*x)),
                None => Cell::Null,
            }));
            out
        })
        .collect();

    Some(FittedTable {
        polynomials,
        table: PivotTable { headers, rows },
    })
}
