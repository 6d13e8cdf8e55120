//! Grouped-median imputation for records the identity cannot recover

use super::record::{NumericField, NumericTriple, RecoveryClass};
use super::report::RecoveryReport;
use crate::error::{Result, SalvageError};
use crate::utils::stats;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Median of each numeric field over a reference set
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMedians {
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub total: Option<f64>,
}

impl FieldMedians {
    fn from_triples(triples: &[NumericTriple]) -> Self {
        let collect = |field: NumericField| -> Vec<f64> {
            triples.iter().filter_map(|t| t.get(field)).collect()
        };
        Self {
            quantity: stats::median(&collect(NumericField::Quantity)),
            unit_price: stats::median(&collect(NumericField::UnitPrice)),
            total: stats::median(&collect(NumericField::Total)),
        }
    }

    pub fn get(&self, field: NumericField) -> Option<f64> {
        match field {
            NumericField::Quantity => self.quantity,
            NumericField::UnitPrice => self.unit_price,
            NumericField::Total => self.total,
        }
    }
}

/// Per-item and global medians over `Complete` records.
///
/// Built once per batch before any fill, so fills never feed back into the
/// reference statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupMedians {
    pub by_group: BTreeMap<String, FieldMedians>,
    pub global: FieldMedians,
    pub reference_rows: usize,
}

impl GroupMedians {
    /// Build the table from `Complete` records only
    pub fn fit(groups: &[Option<String>], triples: &[NumericTriple], classes: &[RecoveryClass]) -> Self {
        let mut grouped: BTreeMap<String, Vec<NumericTriple>> = BTreeMap::new();
        let mut reference: Vec<NumericTriple> = Vec::new();

        for ((group, triple), class) in groups.iter().zip(triples).zip(classes) {
            if *class != RecoveryClass::Complete {
                continue;
            }
            reference.push(*triple);
            if let Some(group) = group {
                grouped.entry(group.clone()).or_default().push(*triple);
            }
        }

        let by_group = grouped
            .into_iter()
            .map(|(group, members)| (group, FieldMedians::from_triples(&members)))
            .collect();

        Self {
            by_group,
            global: FieldMedians::from_triples(&reference),
            reference_rows: reference.len(),
        }
    }

    /// Median for `field` in `group`, falling back to the global median.
    ///
    /// The flag is true when the global median was used.
    pub fn lookup(&self, group: Option<&str>, field: NumericField) -> Result<(f64, bool)> {
        if let Some(value) = group
            .and_then(|g| self.by_group.get(g))
            .and_then(|medians| medians.get(field))
        {
            return Ok((value, false));
        }

        self.global
            .get(field)
            .map(|value| (value, true))
            .ok_or_else(|| SalvageError::NoReferenceData {
                field: field.to_string(),
            })
    }
}

/// What the imputer did to one record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImputeOutcome {
    /// Fields set directly from a median
    pub imputed: Vec<NumericField>,
    /// Fields derived from the identity after imputation
    pub derived: Vec<NumericField>,
    /// Fields whose median came from the global fallback
    pub global_fallbacks: Vec<NumericField>,
    /// An observed total was replaced to keep the identity
    pub overwrote_total: bool,
}

impl ImputeOutcome {
    pub fn is_imputed(&self) -> bool {
        !self.imputed.is_empty()
    }
}

/// Fills `Unsolvable` records from grouped medians
#[derive(Debug, Clone)]
pub struct GroupedMedianImputer {
    medians: GroupMedians,
}

impl GroupedMedianImputer {
    pub fn new(medians: GroupMedians) -> Self {
        Self { medians }
    }

    pub fn medians(&self) -> &GroupMedians {
        &self.medians
    }

    /// Fields that cannot be trusted for this record.
    ///
    /// Missing fields always count. A single missing field means the solver
    /// deferred the record, so the divisor that blocked it is distrusted too.
    pub fn unknown_fields(triple: &NumericTriple) -> Vec<NumericField> {
        let mut unknown = triple.missing();
        if let &[field] = unknown.as_slice() {
            unknown.push(field.divisor());
            unknown.sort();
        }
        unknown
    }

    /// Fill one record in place
    pub fn impute_row(&self, group: Option<&str>, triple: &mut NumericTriple) -> Result<ImputeOutcome> {
        let unknown = Self::unknown_fields(triple);
        let mut outcome = ImputeOutcome::default();
        if unknown.is_empty() {
            return Ok(outcome);
        }

        let fill = |field: NumericField, triple: &mut NumericTriple, outcome: &mut ImputeOutcome| -> Result<f64> {
            let (value, fallback) = self.medians.lookup(group, field)?;
            triple.set(field, value);
            outcome.imputed.push(field);
            if fallback {
                outcome.global_fallbacks.push(field);
            }
            Ok(value)
        };

        if !unknown.contains(&NumericField::Total) {
            let total = triple.total.unwrap_or_default();

            let unit_price = fill(NumericField::UnitPrice, triple, &mut outcome)?;
            if unit_price != 0.0 {
                triple.set(NumericField::Quantity, total / unit_price);
                outcome.derived.push(NumericField::Quantity);
                return Ok(outcome);
            }

            let quantity = fill(NumericField::Quantity, triple, &mut outcome)?;
            if quantity != 0.0 {
                triple.set(NumericField::UnitPrice, total / quantity);
                outcome.derived.push(NumericField::UnitPrice);
                outcome.imputed.retain(|f| *f != NumericField::UnitPrice);
                outcome.global_fallbacks.retain(|f| *f != NumericField::UnitPrice);
                return Ok(outcome);
            }

            // Both medians are zero: the observed total cannot be honoured
            triple.set(NumericField::Total, 0.0);
            outcome.derived.push(NumericField::Total);
            outcome.overwrote_total = total != 0.0;
            return Ok(outcome);
        }

        for field in [NumericField::Quantity, NumericField::UnitPrice] {
            if unknown.contains(&field) {
                fill(field, triple, &mut outcome)?;
            }
        }
        let quantity = triple.quantity.unwrap_or_default();
        let unit_price = triple.unit_price.unwrap_or_default();
        triple.set(NumericField::Total, quantity * unit_price);
        outcome.derived.push(NumericField::Total);

        Ok(outcome)
    }

    /// Fill every `Unsolvable` record; returns the `is_imputed` flags
    pub fn impute_all(
        &self,
        groups: &[Option<String>],
        triples: &mut [NumericTriple],
        classes: &[RecoveryClass],
        report: &mut RecoveryReport,
    ) -> Result<Vec<bool>> {
        let outcomes: Vec<ImputeOutcome> = triples
            .par_iter_mut()
            .zip(groups.par_iter())
            .zip(classes.par_iter())
            .map(|((triple, group), class)| {
                if *class == RecoveryClass::Unsolvable {
                    self.impute_row(group.as_deref(), triple)
                } else {
                    Ok(ImputeOutcome::default())
                }
            })
            .collect::<Result<Vec<_>>>()?;

        for outcome in &outcomes {
            if outcome.is_imputed() {
                report.imputed_rows += 1;
            }
            for field in &outcome.imputed {
                report.record_imputed_value(*field);
            }
            for field in &outcome.derived {
                report.record_derived(*field);
            }
            for field in &outcome.global_fallbacks {
                report.record_global_fallback(*field);
            }
            if outcome.overwrote_total {
                report.overwritten_totals += 1;
            }
        }

        if report.overwritten_totals > 0 {
            tracing::warn!(
                rows = report.overwritten_totals,
                "Observed totals replaced because both reference medians were zero"
            );
        }
        tracing::debug!(
            imputed = report.imputed_rows,
            fallbacks = report.total_global_fallbacks(),
            "Grouped imputation finished"
        );

        Ok(outcomes.iter().map(ImputeOutcome::is_imputed).collect())
    }
}
