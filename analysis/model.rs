use crate::data::{ReviewTable, SchemaColumn, Tone};
use crate::ols::{FitError, OlsFit, fit_ols_hc1};
use crate::segment::{SegmentKind, SegmentedData};
use ndarray::{Array1, Array2, ArrayView1};

/// Name of the intercept term in every coefficient table.
pub const INTERCEPT: &str = "const";

/// The fixed covariates entered into every model, in design-matrix order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Covariate {
    GenderMale,
    RaceWhite,
    RegionWest,
    Top100,
    AcademicAge,
    AvgC2,
    WorkCount,
    SourceNature,
    PubYearScaled,
    DaysReceivedToAccepted,
    TotalAuthors,
    EffectiveWords,
}

impl Covariate {
    pub const ALL: [Covariate; 12] = [
        Covariate::GenderMale,
        Covariate::RaceWhite,
        Covariate::RegionWest,
        Covariate::Top100,
        Covariate::AcademicAge,
        Covariate::AvgC2,
        Covariate::WorkCount,
        Covariate::SourceNature,
        Covariate::PubYearScaled,
        Covariate::DaysReceivedToAccepted,
        Covariate::TotalAuthors,
        Covariate::EffectiveWords,
    ];

    /// The input column this covariate is read from, or `None` for the derived
    /// `pub_year_scaled`.
    pub fn schema_column(self) -> Option<SchemaColumn> {
        match self {
            Covariate::GenderMale => Some(SchemaColumn::GenderMale),
            Covariate::RaceWhite => Some(SchemaColumn::RaceWhite),
            Covariate::RegionWest => Some(SchemaColumn::RegionWest),
            Covariate::Top100 => Some(SchemaColumn::Top100),
            Covariate::AcademicAge => Some(SchemaColumn::AcademicAge),
            Covariate::AvgC2 => Some(SchemaColumn::AvgC2),
            Covariate::WorkCount => Some(SchemaColumn::WorkCount),
            Covariate::SourceNature => Some(SchemaColumn::SourceNature),
            Covariate::PubYearScaled => None,
            Covariate::DaysReceivedToAccepted => Some(SchemaColumn::DaysReceivedToAccepted),
            Covariate::TotalAuthors => Some(SchemaColumn::TotalAuthors),
            Covariate::EffectiveWords => Some(SchemaColumn::EffectiveWords),
        }
    }

    pub fn name(self) -> &'static str {
        match self.schema_column() {
            Some(column) => column.name(),
            None => "pub_year_scaled",
        }
    }
}

/// One column of a design matrix, after the intercept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Regressor {
    Covariate(Covariate),
    /// Index into `ReviewTable::fields()`.
    Field(usize),
    Tone(Tone),
}

impl Regressor {
    pub fn name(self, table: &ReviewTable) -> &str {
        match self {
            Regressor::Covariate(covariate) => covariate.name(),
            Regressor::Field(index) => &table.fields()[index].name,
            Regressor::Tone(tone) => tone.column_name(),
        }
    }

    fn values<'a>(self, data: &'a SegmentedData<'_>) -> ArrayView1<'a, f64> {
        let table = data.table();
        match self {
            Regressor::Covariate(covariate) => match covariate.schema_column() {
                Some(column) => table.column(column),
                None => data.pub_year_scaled(),
            },
            Regressor::Field(index) => table.fields()[index].values.view(),
            Regressor::Tone(tone) => table.column(tone.schema_column()),
        }
    }
}

/// A (segment, dependent tone) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub segment: SegmentKind,
    pub dependent: Tone,
}

impl ModelSpec {
    /// `{dependent column}_{segment}`, e.g. `Weighted_Critical_anon`.
    pub fn key(&self) -> String {
        format!("{}_{}", self.dependent.column_name(), self.segment.name())
    }

    /// Fixed covariates, then every non-reference field indicator, then the
    /// other three tones.
    pub fn regressors(&self, table: &ReviewTable) -> Vec<Regressor> {
        Covariate::ALL
            .iter()
            .map(|&c| Regressor::Covariate(c))
            .chain(table.regressor_fields().into_iter().map(Regressor::Field))
            .chain(
                Tone::ALL
                    .iter()
                    .filter(|&&t| t != self.dependent)
                    .map(|&t| Regressor::Tone(t)),
            )
            .collect()
    }
}

/// All twelve models in run order: segments outer, tones inner.
pub fn model_specs() -> Vec<ModelSpec> {
    SegmentKind::ALL
        .iter()
        .flat_map(|&segment| {
            Tone::ALL
                .iter()
                .map(move |&dependent| ModelSpec { segment, dependent })
        })
        .collect()
}

/// The complete-case design for one model.
#[derive(Debug, Clone)]
pub struct Design {
    /// Column names of `x`, intercept first.
    pub terms: Vec<String>,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    /// Size of the source segment before dropping incomplete rows.
    pub segment_rows: usize,
}

/// Selects the model's columns from its segment, drops every row with a
/// missing value among them, and prepends the intercept.
pub fn build_design(data: &SegmentedData<'_>, spec: &ModelSpec) -> Design {
    let table = data.table();
    let regressors = spec.regressors(table);
    let columns: Vec<ArrayView1<'_, f64>> = regressors.iter().map(|r| r.values(data)).collect();
    let response = table.column(spec.dependent.schema_column());

    let segment = data.segment(spec.segment);
    let complete: Vec<usize> = segment
        .rows
        .iter()
        .copied()
        .filter(|&row| !response[row].is_nan() && columns.iter().all(|c| !c[row].is_nan()))
        .collect();

    let k = regressors.len() + 1;
    let x = Array2::from_shape_fn((complete.len(), k), |(i, j)| match j {
        0 => 1.0,
        _ => columns[j - 1][complete[i]],
    });
    let y = complete.iter().map(|&row| response[row]).collect::<Array1<f64>>();

    let terms = std::iter::once(INTERCEPT.to_string())
        .chain(regressors.iter().map(|r| r.name(table).to_string()))
        .collect();

    log::debug!(
        "{}: {} of {} segment rows complete, {} parameters",
        spec.key(),
        complete.len(),
        segment.len(),
        k
    );

    Design {
        terms,
        x,
        y,
        segment_rows: segment.len(),
    }
}

/// A fitted model together with what is needed to report it.
#[derive(Debug, Clone)]
pub struct FittedModel {
    pub spec: ModelSpec,
    pub terms: Vec<String>,
    pub segment_rows: usize,
    pub fit: OlsFit,
}

impl FittedModel {
    pub fn key(&self) -> String {
        self.spec.key()
    }
}

pub fn fit_model(data: &SegmentedData<'_>, spec: &ModelSpec) -> Result<FittedModel, FitError> {
    let design = build_design(data, spec);
    let fit = fit_ols_hc1(design.x.view(), design.y.view())?;
    Ok(FittedModel {
        spec: *spec,
        terms: design.terms,
        segment_rows: design.segment_rows,
        fit,
    })
}
