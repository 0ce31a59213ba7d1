//! # Coefficient and Summary Tables
//!
//! Each fitted model is written as one CSV coefficient table, and the run as a
//! whole gets one metadata table. Cells use the precision of a regression
//! summary printout: coefficients to four places, everything else to three,
//! switching to significant digits for very large or very small magnitudes.
//! Identical fits therefore always produce byte-identical files.

use crate::model::FittedModel;
use csv::WriterBuilder;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Could not create output directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Could not flush '{path}': {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One row of a coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    pub term: String,
    pub coef: f64,
    pub std_err: f64,
    pub z: f64,
    pub p: f64,
    pub conf_lower: f64,
    pub conf_upper: f64,
}

/// One row of the run metadata table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummaryRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Round")]
    pub round: String,
    #[serde(rename = "Adj_R_squared")]
    pub adj_r_squared: f64,
    #[serde(rename = "F_statistic")]
    pub f_statistic: f64,
    #[serde(rename = "N_obs")]
    pub n_obs: usize,
    #[serde(rename = "MSE")]
    pub mse: f64,
    #[serde(rename = "RMSE")]
    pub rmse: f64,
}

/// Rounds to `decimals` places through correctly rounded decimal formatting.
pub fn round_decimals(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

/// Rounds to `digits` significant digits.
pub fn round_significant(value: f64, digits: usize) -> f64 {
    if !value.is_finite() || value == 0.0 {
        return value;
    }
    let precision = digits.saturating_sub(1);
    format!("{value:.precision$e}").parse().unwrap_or(value)
}

/// Summary-printout precision: fixed `decimals` places for moderate
/// magnitudes, `decimals` significant digits outside `[1e-4, 1e4)`.
pub fn summary_precision(value: f64, decimals: usize) -> f64 {
    let magnitude = value.abs();
    if (1e-4..1e4).contains(&magnitude) {
        round_decimals(value, decimals)
    } else {
        round_significant(value, decimals)
    }
}

pub fn coefficient_rows(model: &FittedModel) -> Vec<CoefficientRow> {
    let fit = &model.fit;
    model
        .terms
        .iter()
        .enumerate()
        .map(|(i, term)| CoefficientRow {
            term: term.clone(),
            coef: summary_precision(fit.coef[i], 4),
            std_err: summary_precision(fit.std_err[i], 3),
            z: summary_precision(fit.z[i], 3),
            p: round_decimals(fit.p[i], 3),
            conf_lower: summary_precision(fit.conf_lower[i], 3),
            conf_upper: summary_precision(fit.conf_upper[i], 3),
        })
        .collect()
}

pub fn summary_row(model: &FittedModel, round: &str) -> ModelSummaryRow {
    let fit = &model.fit;
    ModelSummaryRow {
        model: model.key(),
        round: round.to_string(),
        adj_r_squared: round_decimals(fit.r_squared_adj, 3),
        f_statistic: round_decimals(fit.f_statistic, 3),
        n_obs: fit.n_obs,
        mse: round_decimals(fit.mse, 4),
        rmse: round_decimals(fit.rmse, 4),
    }
}

/// Header of a coefficient table. The z and p columns carry the model key so
/// tables from different models can be joined side by side.
pub fn coefficient_header(key: &str) -> [String; 7] {
    [
        "term".to_string(),
        "coef".to_string(),
        "std err".to_string(),
        format!("robust_{key}_z"),
        format!("robust_{key}_p"),
        "[0.025".to_string(),
        "0.975]".to_string(),
    ]
}

pub fn coefficient_table_path(output_dir: &Path, key: &str, round: &str) -> PathBuf {
    output_dir.join(format!("regs_{key}_round{round}.csv"))
}

pub fn summary_table_path(output_dir: &Path, round: &str) -> PathBuf {
    output_dir.join(format!("model_summary_metadata_round{round}.csv"))
}

pub fn ensure_output_dir(output_dir: &Path) -> Result<(), ReportError> {
    fs::create_dir_all(output_dir).map_err(|source| ReportError::CreateDir {
        path: output_dir.to_path_buf(),
        source,
    })
}

pub fn write_coefficient_table(
    output_dir: &Path,
    round: &str,
    model: &FittedModel,
) -> Result<PathBuf, ReportError> {
    let key = model.key();
    let path = coefficient_table_path(output_dir, &key, round);
    let write_err = |source| ReportError::Write {
        path: path.clone(),
        source,
    };

    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_path(&path)
        .map_err(write_err)?;
    writer
        .write_record(coefficient_header(&key))
        .map_err(write_err)?;
    for row in coefficient_rows(model) {
        writer.serialize(row).map_err(write_err)?;
    }
    writer.flush().map_err(|source| ReportError::Flush {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

pub fn write_summary_table(
    output_dir: &Path,
    round: &str,
    rows: &[ModelSummaryRow],
) -> Result<PathBuf, ReportError> {
    let path = summary_table_path(output_dir, round);
    let write_err = |source| ReportError::Write {
        path: path.clone(),
        source,
    };

    let mut writer = WriterBuilder::new().from_path(&path).map_err(write_err)?;
    if rows.is_empty() {
        writer
            .write_record([
                "Model",
                "Round",
                "Adj_R_squared",
                "F_statistic",
                "N_obs",
                "MSE",
                "RMSE",
            ])
            .map_err(write_err)?;
    }
    for row in rows {
        writer.serialize(row).map_err(write_err)?;
    }
    writer.flush().map_err(|source| ReportError::Flush {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Tone;
    use crate::model::ModelSpec;
    use crate::ols::OlsFit;
    use crate::segment::SegmentKind;
    use ndarray::{Array2, array};

    fn fitted() -> FittedModel {
        FittedModel {
            spec: ModelSpec {
                segment: SegmentKind::Anon,
                dependent: Tone::Critical,
            },
            terms: vec!["const".to_string(), "avg_c2".to_string()],
            segment_rows: 120,
            fit: OlsFit {
                coef: array![0.123_456, 12_345.678],
                std_err: array![0.045_678, 0.000_012_34],
                z: array![2.702_7, 1.000_5e9],
                p: array![0.006_876, 0.0],
                conf_lower: array![0.033_93, 12_345.6],
                conf_upper: array![0.212_98, 12_345.7],
                robust_cov: Array2::zeros((2, 2)),
                n_obs: 118,
                df_resid: 116,
                r_squared: 0.41,
                r_squared_adj: 0.404_96,
                f_statistic: 17.123_49,
                mse: 0.012_345_67,
                rmse: 0.111_110_6,
            },
        }
    }

    #[test]
    fn precision_follows_summary_layout() {
        assert_eq!(summary_precision(0.123_456, 4), 0.1235);
        assert_eq!(summary_precision(-2.000_49, 3), -2.0);
        assert_eq!(summary_precision(12_345.678, 4), 12_350.0);
        assert_eq!(summary_precision(0.000_012_34, 3), 0.000_012_3);
        assert_eq!(summary_precision(0.0, 3), 0.0);
        assert!(summary_precision(f64::NAN, 3).is_nan());
        assert_eq!(round_decimals(0.404_96, 3), 0.405);
        assert_eq!(round_significant(987_654.0, 3), 988_000.0);
    }

    #[test]
    fn coefficient_rows_are_rounded() {
        let rows = coefficient_rows(&fitted());
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0],
            CoefficientRow {
                term: "const".to_string(),
                coef: 0.1235,
                std_err: 0.046,
                z: 2.703,
                p: 0.007,
                conf_lower: 0.034,
                conf_upper: 0.213,
            }
        );
        assert_eq!(rows[1].coef, 12_350.0);
        assert_eq!(rows[1].std_err, 0.000_012_3);
        assert_eq!(rows[1].z, 1.0e9);
        assert_eq!(rows[1].p, 0.0);
    }

    #[test]
    fn summary_row_rounds_fit_statistics() {
        let row = summary_row(&fitted(), "1");
        assert_eq!(row.model, "Weighted_Critical_anon");
        assert_eq!(row.round, "1");
        assert_eq!(row.adj_r_squared, 0.405);
        assert_eq!(row.f_statistic, 17.123);
        assert_eq!(row.n_obs, 118);
        assert_eq!(row.mse, 0.0123);
        assert_eq!(row.rmse, 0.1111);
    }

    #[test]
    fn coefficient_table_has_keyed_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_coefficient_table(dir.path(), "1", &fitted()).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "regs_Weighted_Critical_anon_round1.csv"
        );

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "term,coef,std err,robust_Weighted_Critical_anon_z,robust_Weighted_Critical_anon_p,[0.025,0.975]"
        );
        assert_eq!(lines.next().unwrap(), "const,0.1235,0.046,2.703,0.007,0.034,0.213");
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn summary_table_lists_every_model() {
        let dir = tempfile::tempdir().unwrap();
        let model = fitted();
        let rows = vec![summary_row(&model, "2"), summary_row(&model, "2")];
        let path = write_summary_table(dir.path(), "2", &rows).unwrap();
        assert_eq!(
            path.file_name().unwrap(),
            "model_summary_metadata_round2.csv"
        );

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "Model,Round,Adj_R_squared,F_statistic,N_obs,MSE,RMSE"
        );
        assert_eq!(lines[1], "Weighted_Critical_anon,2,0.405,17.123,118,0.0123,0.1111");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn empty_summary_table_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_summary_table(dir.path(), "1", &[]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.trim_end(), "Model,Round,Adj_R_squared,F_statistic,N_obs,MSE,RMSE");
    }
}
