//! End-to-end run: recovery, validation, outlier removal, feature preparation

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::preprocessing::{FeaturePipeline, OutlierFilter, OutlierSummary, PreparedDataset, TargetTransform};
use crate::recovery::{MissingnessProfile, RecoveryEngine, RecoveryOutput, RecoveryReport};
use crate::utils::Timer;
use crate::validation::{ValidationHarness, ValidationReport};
use polars::prelude::*;
use serde::Serialize;
use tracing::info;

/// Everything produced by one pipeline run
#[derive(Debug, Clone)]
pub struct SalvageOutput {
    pub recovery: RecoveryOutput,
    pub validation: ValidationReport,
    pub outliers: OutlierSummary,
    /// Recovered rows that survived the outlier filter
    pub cleaned: DataFrame,
    pub prepared: PreparedDataset,
}

/// Serializable run summary written next to the outputs
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub recovery: &'a RecoveryReport,
    pub profile_before: &'a MissingnessProfile,
    pub profile_after: &'a MissingnessProfile,
    pub validation: &'a ValidationReport,
    pub outliers: &'a OutlierSummary,
    pub target_transform: TargetTransform,
    pub target_skewness: f64,
    pub train_rows: usize,
    pub holdout_rows: usize,
}

impl SalvageOutput {
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            recovery: &self.recovery.report,
            profile_before: &self.recovery.profile_before,
            profile_after: &self.recovery.profile_after,
            validation: &self.validation,
            outliers: &self.outliers,
            target_transform: self.prepared.target_transform(),
            target_skewness: self.prepared.target_skewness,
            train_rows: self.prepared.train.height(),
            holdout_rows: self.prepared.holdout.height(),
        }
    }
}

/// Runs every stage in order over one raw batch
#[derive(Debug, Clone)]
pub struct SalvagePipeline {
    config: PipelineConfig,
}

impl SalvagePipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Recover the batch and check the identity, without preparing features
    pub fn recover(&self, raw: &DataFrame) -> Result<(RecoveryOutput, ValidationReport)> {
        let recovery = RecoveryEngine::new(self.config.schema.clone()).run(raw)?;
        let validation = ValidationHarness::new(self.config.schema.clone(), self.config.identity_tolerance)
            .validate(&recovery.data)?;
        Ok((recovery, validation))
    }

    /// Full run. An identity violation after recovery aborts before any
    /// feature is fitted.
    pub fn run(&self, raw: &DataFrame) -> Result<SalvageOutput> {
        let timer = Timer::start();

        let (recovery, validation) = self.recover(raw)?;
        validation.ensure_identity()?;

        let filter = OutlierFilter::new(self.config.schema.total.as_str(), self.config.outlier_iqr_factor);
        let (cleaned, outliers) = filter.filter(&recovery.data)?;

        let prepared = FeaturePipeline::new(self.config.clone()).prepare(&cleaned)?;

        info!(
            rows_in = recovery.report.rows_in,
            train = prepared.train.height(),
            holdout = prepared.holdout.height(),
            elapsed_secs = timer.elapsed_secs(),
            "Pipeline finished"
        );

        Ok(SalvageOutput {
            recovery,
            validation,
            outliers,
            cleaned,
            prepared,
        })
    }
}
