//! Exact recovery of a single missing field from `total = quantity * unit_price`

use super::record::{NumericField, NumericTriple, RecoveryClass};
use super::report::RecoveryReport;
use rayon::prelude::*;

/// Result of attempting a deterministic solve on one record
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolveOutcome {
    /// Record was not `Solvable`; nothing to do
    Skipped,
    /// The missing field was recovered exactly
    Solved { field: NumericField, value: f64 },
    /// The divisor (or the unit price of a missing total) was zero
    Deferred { field: NumericField, blocked_by: NumericField },
}

/// Deterministic equation solver.
///
/// Solved values are ground truth, so this never marks a record imputed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EquationSolver;

impl EquationSolver {
    pub fn new() -> Self {
        Self
    }

    /// Compute the missing field without mutating the record
    pub fn solve_row(&self, triple: &NumericTriple, class: RecoveryClass) -> SolveOutcome {
        let RecoveryClass::Solvable(field) = class else {
            return SolveOutcome::Skipped;
        };

        let blocked_by = field.divisor();
        if triple.get(blocked_by) == Some(0.0) {
            return SolveOutcome::Deferred { field, blocked_by };
        }

        let value = match field {
            NumericField::Total => triple.quantity.zip(triple.unit_price).map(|(q, p)| q * p),
            NumericField::Quantity => triple.total.zip(triple.unit_price).map(|(t, p)| t / p),
            NumericField::UnitPrice => triple.total.zip(triple.quantity).map(|(t, q)| t / q),
        };

        match value {
            Some(value) if value.is_finite() => SolveOutcome::Solved { field, value },
            Some(_) => SolveOutcome::Deferred { field, blocked_by },
            // Class is stale: the other two fields are not both present
            None => SolveOutcome::Skipped,
        }
    }

    /// Solve every `Solvable` record in place.
    ///
    /// Deferred records are reclassified `Unsolvable` for the imputer.
    pub fn solve_all(
        &self,
        triples: &mut [NumericTriple],
        classes: &mut [RecoveryClass],
        report: &mut RecoveryReport,
    ) -> Vec<SolveOutcome> {
        let outcomes: Vec<SolveOutcome> = triples
            .par_iter_mut()
            .zip(classes.par_iter_mut())
            .map(|(triple, class)| {
                let outcome = self.solve_row(triple, *class);
                match outcome {
                    SolveOutcome::Solved { field, value } => triple.set(field, value),
                    SolveOutcome::Deferred { .. } => *class = RecoveryClass::Unsolvable,
                    SolveOutcome::Skipped => {}
                }
                outcome
            })
            .collect();

        for outcome in &outcomes {
            match outcome {
                SolveOutcome::Solved { field, .. } => report.record_solved(*field),
                SolveOutcome::Deferred { .. } => report.zero_divisor_deferrals += 1,
                SolveOutcome::Skipped => {}
            }
        }

        tracing::debug!(
            solved = report.total_solved(),
            deferred = report.zero_divisor_deferrals,
            "Deterministic solve finished"
        );
        outcomes
    }
}
