//! Counters for every recovered, deferred or excluded record

use super::record::{NumericField, RecoveryClass};
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What happened to the batch during recovery.
///
/// Per-record failures never abort a run; they land here instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub rows_in: usize,
    pub rows_out: usize,

    /// Placeholder tokens replaced by nulls, per column
    pub sentinel_values: BTreeMap<String, usize>,
    /// Values that failed type coercion and were marked missing, per column
    pub coercion_failures: BTreeMap<String, usize>,
    /// Parsed values outside the field's valid range, marked missing, per column
    pub domain_violations: BTreeMap<String, usize>,

    /// Class counts as first assigned by the classifier
    pub class_counts: BTreeMap<String, usize>,
    /// Rows excluded for a missing timestamp
    pub dropped_missing_timestamp: usize,

    /// Fields recovered exactly from the identity, per field
    pub solved: BTreeMap<String, usize>,
    /// Solvable rows deferred because of a zero divisor
    pub zero_divisor_deferrals: usize,

    /// Rows filled by the grouped imputer
    pub imputed_rows: usize,
    /// Field values taken directly from a median, per field
    pub imputed_values: BTreeMap<String, usize>,
    /// Field values derived from the identity after imputation, per field
    pub derived_after_imputation: BTreeMap<String, usize>,
    /// Median lookups that fell back to the global median, per field
    pub global_fallbacks: BTreeMap<String, usize>,
    /// Rows whose observed total had to be replaced to keep the identity
    pub overwritten_totals: usize,

    /// Placeholder fills for categoricals, per column
    pub categorical_fills: BTreeMap<String, usize>,

    /// Seconds spent per stage
    pub stage_timings: BTreeMap<String, f64>,
}

impl RecoveryReport {
    pub fn record_sentinels(&mut self, column: &str, count: usize) {
        if count > 0 {
            *self.sentinel_values.entry(column.to_string()).or_insert(0) += count;
        }
    }

    pub fn record_coercion_failures(&mut self, column: &str, count: usize) {
        if count > 0 {
            *self.coercion_failures.entry(column.to_string()).or_insert(0) += count;
        }
    }

    pub fn record_domain_violations(&mut self, column: &str, count: usize) {
        if count > 0 {
            *self.domain_violations.entry(column.to_string()).or_insert(0) += count;
        }
    }

    pub fn record_class(&mut self, class: RecoveryClass) {
        *self.class_counts.entry(class.label().to_string()).or_insert(0) += 1;
    }

    pub fn record_solved(&mut self, field: NumericField) {
        *self.solved.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn record_imputed_value(&mut self, field: NumericField) {
        *self.imputed_values.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn record_derived(&mut self, field: NumericField) {
        *self.derived_after_imputation.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn record_global_fallback(&mut self, field: NumericField) {
        *self.global_fallbacks.entry(field.to_string()).or_insert(0) += 1;
    }

    pub fn record_categorical_fill(&mut self, column: &str, count: usize) {
        if count > 0 {
            *self.categorical_fills.entry(column.to_string()).or_insert(0) += count;
        }
    }

    pub fn record_timing(&mut self, stage: &str, secs: f64) {
        self.stage_timings.insert(stage.to_string(), secs);
    }

    /// Total number of values that failed coercion
    pub fn total_coercion_failures(&self) -> usize {
        self.coercion_failures.values().sum()
    }

    /// Total number of out-of-range values
    pub fn total_domain_violations(&self) -> usize {
        self.domain_violations.values().sum()
    }

    /// Total number of global-median fallbacks
    pub fn total_global_fallbacks(&self) -> usize {
        self.global_fallbacks.values().sum()
    }

    /// Total number of exactly recovered values
    pub fn total_solved(&self) -> usize {
        self.solved.values().sum()
    }
}

/// Null count and rate of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissingness {
    pub column: String,
    pub null_count: usize,
    pub null_rate: f64,
}

/// Per-column missingness snapshot of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissingnessProfile {
    pub rows: usize,
    pub columns: Vec<ColumnMissingness>,
}

impl MissingnessProfile {
    /// Profile every column of `df` in column order
    pub fn from_frame(df: &DataFrame) -> Result<Self> {
        let rows = df.height();
        let columns = df
            .get_columns()
            .iter()
            .map(|col| {
                let null_count = col.null_count();
                ColumnMissingness {
                    column: col.name().to_string(),
                    null_count,
                    null_rate: if rows == 0 {
                        0.0
                    } else {
                        null_count as f64 / rows as f64
                    },
                }
            })
            .collect();

        Ok(Self { rows, columns })
    }

    /// Null count of a column, if profiled
    pub fn null_count(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.null_count)
    }

    /// Total null cells across all profiled columns
    pub fn total_nulls(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }
}
