//! Post-recovery checks
//!
//! The identity residual is a hard check. The imputed-vs-observed mean gap is
//! a soft signal that imputation is not distorting the distribution.

use crate::config::SchemaConfig;
use crate::error::{Result, SalvageError};
use crate::recovery::{NumericTriple, IS_IMPUTED_COLUMN};
use crate::utils::SummaryStats;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Findings of one validation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Rows with all three numeric fields present
    pub checked_rows: usize,
    /// Rows whose residual exceeds the tolerance
    pub violations: usize,
    pub max_abs_residual: f64,
    pub tolerance: f64,

    /// Distribution of `total` over imputed rows
    pub imputed_total: SummaryStats,
    /// Distribution of `total` over observed or exactly solved rows
    pub observed_total: SummaryStats,
    /// Imputed mean minus observed mean
    pub mean_difference: Option<f64>,
}

impl ValidationReport {
    pub fn identity_holds(&self) -> bool {
        self.violations == 0
    }

    /// Turn an identity failure into an error
    pub fn ensure_identity(&self) -> Result<()> {
        if self.identity_holds() {
            return Ok(());
        }
        Err(SalvageError::IdentityViolation {
            violations: self.violations,
            max_residual: self.max_abs_residual,
            tolerance: self.tolerance,
        })
    }
}

/// Read-only checks over a recovered table
#[derive(Debug, Clone)]
pub struct ValidationHarness {
    schema: SchemaConfig,
    tolerance: f64,
}

impl ValidationHarness {
    pub fn new(schema: SchemaConfig, tolerance: f64) -> Self {
        Self { schema, tolerance }
    }

    /// `|total - quantity * unit_price| <= tol * max(1, |total|)`
    pub fn within_tolerance(&self, triple: &NumericTriple) -> Option<bool> {
        let residual = triple.residual()?;
        let total = triple.total?;
        Some(residual.abs() <= self.tolerance * total.abs().max(1.0))
    }

    /// Run both checks. A table without `is_imputed` counts as fully observed.
    pub fn validate(&self, df: &DataFrame) -> Result<ValidationReport> {
        let triples = NumericTriple::extract(df, &self.schema)?;
        let imputed: Vec<bool> = match df.column(IS_IMPUTED_COLUMN) {
            Ok(column) => column.bool()?.into_iter().map(|v| v.unwrap_or(false)).collect(),
            Err(_) => vec![false; df.height()],
        };

        let mut checked_rows = 0;
        let mut violations = 0;
        let mut max_abs_residual: f64 = 0.0;
        for triple in &triples {
            let (Some(residual), Some(ok)) = (triple.residual(), self.within_tolerance(triple)) else {
                continue;
            };
            checked_rows += 1;
            max_abs_residual = max_abs_residual.max(residual.abs());
            if !ok {
                violations += 1;
            }
        }

        let (imputed_totals, observed_totals): (Vec<_>, Vec<_>) = triples
            .iter()
            .zip(&imputed)
            .filter_map(|(triple, flag)| triple.total.map(|t| (t, *flag)))
            .partition(|(_, flag)| *flag);
        let imputed_totals: Vec<f64> = imputed_totals.into_iter().map(|(t, _)| t).collect();
        let observed_totals: Vec<f64> = observed_totals.into_iter().map(|(t, _)| t).collect();

        let imputed_total = SummaryStats::from_values(&imputed_totals);
        let observed_total = SummaryStats::from_values(&observed_totals);
        let mean_difference = imputed_total.mean.zip(observed_total.mean).map(|(i, o)| i - o);

        let report = ValidationReport {
            checked_rows,
            violations,
            max_abs_residual,
            tolerance: self.tolerance,
            imputed_total,
            observed_total,
            mean_difference,
        };

        if report.identity_holds() {
            tracing::info!(
                checked = report.checked_rows,
                max_residual = report.max_abs_residual,
                mean_difference = ?report.mean_difference,
                "Identity check passed"
            );
        } else {
            tracing::warn!(
                violations = report.violations,
                max_residual = report.max_abs_residual,
                "Identity check failed"
            );
        }
        Ok(report)
    }
}
