//! Two-stage recovery: exact solve first, grouped medians second

use super::classifier::MissingnessClassifier;
use super::imputer::{GroupMedians, GroupedMedianImputer};
use super::normalizer::{timestamp_millis, SchemaNormalizer};
use super::record::{NumericTriple, RecoveryClass};
use super::report::{MissingnessProfile, RecoveryReport};
use super::solver::EquationSolver;
use super::{IS_IMPUTED_COLUMN, RECOVERY_CLASS_COLUMN};
use crate::config::SchemaConfig;
use crate::error::Result;
use crate::utils::Timer;
use polars::prelude::*;
use tracing::info;

/// Recovered table plus everything learned while recovering it
#[derive(Debug, Clone)]
pub struct RecoveryOutput {
    /// Typed table with `is_imputed` and `recovery_class` columns
    pub data: DataFrame,
    /// Final class per surviving row, aligned with `data`
    pub classes: Vec<RecoveryClass>,
    /// Reference medians the imputer used
    pub medians: GroupMedians,
    pub report: RecoveryReport,
    /// Missingness after normalization, before any recovery
    pub profile_before: MissingnessProfile,
    /// Missingness after recovery and categorical fills
    pub profile_after: MissingnessProfile,
}

/// Runs normalizer, classifier, solver and imputer in sequence
#[derive(Debug, Clone)]
pub struct RecoveryEngine {
    normalizer: SchemaNormalizer,
    classifier: MissingnessClassifier,
    solver: EquationSolver,
}

impl RecoveryEngine {
    pub fn new(schema: SchemaConfig) -> Self {
        Self {
            normalizer: SchemaNormalizer::new(schema),
            classifier: MissingnessClassifier::new(),
            solver: EquationSolver::new(),
        }
    }

    pub fn schema(&self) -> &SchemaConfig {
        self.normalizer.schema()
    }

    /// Recover a raw table
    pub fn run(&self, raw: &DataFrame) -> Result<RecoveryOutput> {
        let schema = self.schema();
        let mut report = RecoveryReport {
            rows_in: raw.height(),
            ..Default::default()
        };

        let timer = Timer::start();
        let normalized = self.normalizer.normalize(raw, &mut report)?;
        let profile_before = MissingnessProfile::from_frame(&normalized)?;
        report.record_timing("normalize", timer.elapsed_secs());

        let timer = Timer::start();
        let triples = NumericTriple::extract(&normalized, schema)?;
        let timestamps = timestamp_millis(&normalized, &schema.timestamp)?;
        let classes = self.classifier.classify(&triples, &timestamps);
        let (mut df, mut triples, mut classes) =
            self.classifier
                .drop_undated(&normalized, triples, classes, &mut report)?;
        report.record_timing("classify", timer.elapsed_secs());

        let groups: Vec<Option<String>> = df
            .column(&schema.item)?
            .str()?
            .into_iter()
            .map(|opt| opt.map(str::to_string))
            .collect();

        // Reference set is fixed before the solver touches any row
        let medians = GroupMedians::fit(&groups, &triples, &classes);

        let timer = Timer::start();
        self.solver.solve_all(&mut triples, &mut classes, &mut report);
        report.record_timing("solve", timer.elapsed_secs());

        let timer = Timer::start();
        let imputer = GroupedMedianImputer::new(medians);
        let flags = imputer.impute_all(&groups, &mut triples, &classes, &mut report)?;
        report.record_timing("impute", timer.elapsed_secs());

        NumericTriple::write_back(&mut df, schema, &triples)?;
        df.with_column(Series::new(IS_IMPUTED_COLUMN.into(), flags))?;
        let labels: Vec<&str> = classes.iter().map(RecoveryClass::label).collect();
        df.with_column(Series::new(RECOVERY_CLASS_COLUMN.into(), labels))?;

        let df = self.normalizer.fill_categoricals(&df, &mut report)?;
        let profile_after = MissingnessProfile::from_frame(&df)?;
        report.rows_out = df.height();

        info!(
            rows_in = report.rows_in,
            rows_out = report.rows_out,
            dropped = report.dropped_missing_timestamp,
            solved = report.total_solved(),
            imputed = report.imputed_rows,
            fallbacks = report.total_global_fallbacks(),
            "Recovery finished"
        );

        Ok(RecoveryOutput {
            data: df,
            classes,
            medians: imputer.medians().clone(),
            report,
            profile_before,
            profile_after,
        })
    }
}
