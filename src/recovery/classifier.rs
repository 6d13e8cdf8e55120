//! Missingness classification of the numeric triple

use super::record::{NumericTriple, RecoveryClass};
use super::report::RecoveryReport;
use crate::error::Result;
use polars::prelude::*;

/// Tags each record with the recovery tier it needs
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingnessClassifier;

impl MissingnessClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify one record.
    ///
    /// A missing timestamp wins over any numeric state.
    pub fn classify_row(&self, triple: &NumericTriple, has_timestamp: bool) -> RecoveryClass {
        if !has_timestamp {
            return RecoveryClass::Dropped;
        }
        match triple.missing().as_slice() {
            [] => RecoveryClass::Complete,
            [field] => RecoveryClass::Solvable(*field),
            _ => RecoveryClass::Unsolvable,
        }
    }

    /// Classify every record
    pub fn classify(&self, triples: &[NumericTriple], timestamps: &[Option<i64>]) -> Vec<RecoveryClass> {
        triples
            .iter()
            .zip(timestamps)
            .map(|(triple, ts)| self.classify_row(triple, ts.is_some()))
            .collect()
    }

    /// Remove `Dropped` records from the table and the aligned vectors.
    ///
    /// Returns the surviving table, triples and classes, in original order.
    pub fn drop_undated(
        &self,
        df: &DataFrame,
        triples: Vec<NumericTriple>,
        classes: Vec<RecoveryClass>,
        report: &mut RecoveryReport,
    ) -> Result<(DataFrame, Vec<NumericTriple>, Vec<RecoveryClass>)> {
        for class in &classes {
            report.record_class(*class);
        }

        let keep: Vec<bool> = classes
            .iter()
            .map(|class| *class != RecoveryClass::Dropped)
            .collect();
        let dropped = keep.iter().filter(|k| !**k).count();
        report.dropped_missing_timestamp += dropped;

        if dropped == 0 {
            return Ok((df.clone(), triples, classes));
        }

        let mask = BooleanChunked::from_slice("keep".into(), &keep);
        let filtered = df.filter(&mask)?;

        let (triples, classes): (Vec<_>, Vec<_>) = triples
            .into_iter()
            .zip(classes)
            .filter(|(_, class)| *class != RecoveryClass::Dropped)
            .unzip();

        tracing::info!(dropped, remaining = filtered.height(), "Dropped records without timestamp");
        Ok((filtered, triples, classes))
    }
}
