// ========================================================================================
//
//                          The regression pipeline
//
// ========================================================================================
//
// Load, segment, fit, report: strictly in that order, on one thread. Each model
// is independent of the others; the only state carried across iterations is
// the list of summary rows, owned here and written once at the end.
//
// By default the first failing model aborts the run. Coefficient tables already
// written stay on disk. With `keep_going`, failures are collected instead, the
// metadata table lists the models that did fit, and the run still reports an
// error naming every model that failed.

use crate::config::{AnalysisConfig, ConfigError};
use crate::data::{DataError, load_review_table};
use crate::model::{fit_model, model_specs};
use crate::ols::FitError;
use crate::report::{self, ModelSummaryRow, ReportError};
use crate::segment::segment_table;
use itertools::Itertools;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to load input data: {0}")]
    Data(#[from] DataError),
    #[error("Model '{key}' could not be fitted: {source}")]
    ModelFailed {
        key: String,
        #[source]
        source: FitError,
    },
    #[error("{} model(s) could not be fitted: {}", .0.len(), .0.iter().join(", "))]
    ModelsFailed(Vec<String>),
    #[error("Failed to write results: {0}")]
    Report(#[from] ReportError),
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub coefficient_tables: Vec<PathBuf>,
    pub summary_table: PathBuf,
    pub rows: Vec<ModelSummaryRow>,
}

pub fn run(config: &AnalysisConfig) -> Result<RunSummary, PipelineError> {
    config.validate()?;

    // --- Phase 1: Load ---
    let table = load_review_table(&config.input, &config.load_options())?;

    // --- Phase 2: Segment ---
    let data = segment_table(&table, &config.filters);

    // --- Phase 3: Fit and report each model ---
    report::ensure_output_dir(&config.output_dir)?;
    let mut rows = Vec::new();
    let mut coefficient_tables = Vec::new();
    let mut failed = Vec::new();

    for spec in model_specs() {
        let key = spec.key();
        let fitted = match fit_model(&data, &spec) {
            Ok(fitted) => fitted,
            Err(source) if config.keep_going => {
                log::warn!("Skipping model '{key}': {source}");
                failed.push(key);
                continue;
            }
            Err(source) => return Err(PipelineError::ModelFailed { key, source }),
        };

        coefficient_tables.push(report::write_coefficient_table(
            &config.output_dir,
            &config.round,
            &fitted,
        )?);
        rows.push(report::summary_row(&fitted, &config.round));
        println!("Completed: {key}");
    }

    // --- Phase 4: Metadata ---
    let summary_table = report::write_summary_table(&config.output_dir, &config.round, &rows)?;
    log::info!("Wrote model metadata to '{}'", summary_table.display());

    if !failed.is_empty() {
        return Err(PipelineError::ModelsFailed(failed));
    }

    Ok(RunSummary {
        coefficient_tables,
        summary_table,
        rows,
    })
}
