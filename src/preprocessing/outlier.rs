//! IQR outlier bounds over recovered totals
//!
//! Removal is terminal: rows outside the bounds leave the table and are not
//! retried by any later stage.

use crate::error::{Result, SalvageError};
use crate::utils::stats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted bounds for one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub factor: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    /// Compute `[Q1 - k*IQR, Q3 + k*IQR]` with linearly interpolated quartiles
    pub fn from_values(values: &[f64], factor: f64) -> Result<Self> {
        let (q1, q3) = stats::quantile(values, 0.25)
            .zip(stats::quantile(values, 0.75))
            .ok_or_else(|| SalvageError::DataError("cannot compute quartiles of an empty column".to_string()))?;

        let iqr = q3 - q1;
        Ok(Self {
            q1,
            q3,
            iqr,
            factor,
            lower: q1 - factor * iqr,
            upper: q3 + factor * iqr,
        })
    }

    /// Inclusive bounds check
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Outcome of one filtering pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub column: String,
    pub bounds: OutlierBounds,
    pub rows_before: usize,
    pub removed: usize,
}

/// Removes rows whose value in `column` falls outside the IQR bounds
#[derive(Debug, Clone)]
pub struct OutlierFilter {
    column: String,
    factor: f64,
}

impl OutlierFilter {
    pub fn new(column: impl Into<String>, factor: f64) -> Self {
        Self {
            column: column.into(),
            factor,
        }
    }

    /// Standard Tukey fences
    pub fn iqr(column: impl Into<String>) -> Self {
        Self::new(column, 1.5)
    }

    /// Compute the bounds from the non-null values of the column
    pub fn fit(&self, df: &DataFrame) -> Result<OutlierBounds> {
        let values: Vec<f64> = df
            .column(&self.column)
            .map_err(|_| SalvageError::ColumnNotFound(self.column.clone()))?
            .f64()?
            .into_iter()
            .flatten()
            .collect();

        OutlierBounds::from_values(&values, self.factor)
    }

    /// Fit the bounds and drop out-of-range rows.
    ///
    /// Null values are kept; the filter only judges values it can see.
    pub fn filter(&self, df: &DataFrame) -> Result<(DataFrame, OutlierSummary)> {
        let bounds = self.fit(df)?;

        let mask: BooleanChunked = df
            .column(&self.column)?
            .f64()?
            .into_iter()
            .map(|opt| Some(opt.map_or(true, |v| bounds.contains(v))))
            .collect();
        let filtered = df.filter(&mask)?;

        let summary = OutlierSummary {
            column: self.column.clone(),
            bounds,
            rows_before: df.height(),
            removed: df.height() - filtered.height(),
        };

        tracing::info!(
            column = %summary.column,
            lower = bounds.lower,
            upper = bounds.upper,
            removed = summary.removed,
            "Outlier filter applied"
        );
        Ok((filtered, summary))
    }
}
