//! # Data Loading and Coercion Module
//!
//! This module is the exclusive entry point for the review-record dataset.
//! It reads one delimited file, validates its header against a strict,
//! enumerated schema, and coerces every schema column into an `ndarray`
//! vector of `f64` where `NaN` marks a missing value.
//!
//! - Strict Schema: the fixed columns are enumerated by `SchemaColumn` and
//!   `Tone`. Field-indicator columns are the only dynamic part; they are
//!   enumerated once from the header, and the reference category is supplied
//!   explicitly by the caller.
//! - Coercion: the file is read with every column as text and coerced here,
//!   in one place. Booleans become {0, 1}; anything that does not parse as a
//!   finite number becomes missing. Missing values are never rejected at load
//!   time; each model drops the incomplete rows it cares about.

use ndarray::{Array1, ArrayView1};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The four weighted tone scores. Each one is the dependent variable of four
/// models and a control in the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tone {
    Appreciative,
    Constructive,
    Questioning,
    Critical,
}

impl Tone {
    pub const ALL: [Tone; 4] = [
        Tone::Appreciative,
        Tone::Constructive,
        Tone::Questioning,
        Tone::Critical,
    ];

    pub fn column_name(self) -> &'static str {
        self.schema_column().name()
    }

    pub fn schema_column(self) -> SchemaColumn {
        match self {
            Tone::Appreciative => SchemaColumn::WeightedAppreciative,
            Tone::Constructive => SchemaColumn::WeightedConstructive,
            Tone::Questioning => SchemaColumn::WeightedQuestioning,
            Tone::Critical => SchemaColumn::WeightedCritical,
        }
    }
}

/// Every fixed column the input file must carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaColumn {
    DisclosedReviewer,
    TotalAuthors,
    AcademicAge,
    EffectiveWords,
    PublicationYear,
    GenderMale,
    RaceWhite,
    RegionWest,
    Top100,
    AvgC2,
    WorkCount,
    SourceNature,
    DaysReceivedToAccepted,
    WeightedAppreciative,
    WeightedConstructive,
    WeightedQuestioning,
    WeightedCritical,
}

impl SchemaColumn {
    pub const ALL: [SchemaColumn; 17] = [
        SchemaColumn::DisclosedReviewer,
        SchemaColumn::TotalAuthors,
        SchemaColumn::AcademicAge,
        SchemaColumn::EffectiveWords,
        SchemaColumn::PublicationYear,
        SchemaColumn::GenderMale,
        SchemaColumn::RaceWhite,
        SchemaColumn::RegionWest,
        SchemaColumn::Top100,
        SchemaColumn::AvgC2,
        SchemaColumn::WorkCount,
        SchemaColumn::SourceNature,
        SchemaColumn::DaysReceivedToAccepted,
        SchemaColumn::WeightedAppreciative,
        SchemaColumn::WeightedConstructive,
        SchemaColumn::WeightedQuestioning,
        SchemaColumn::WeightedCritical,
    ];

    /// The exact header name expected in the input file.
    pub fn name(self) -> &'static str {
        match self {
            SchemaColumn::DisclosedReviewer => "disclosed_reviewer",
            SchemaColumn::TotalAuthors => "total_authors",
            SchemaColumn::AcademicAge => "academic_age",
            SchemaColumn::EffectiveWords => "effective_words",
            SchemaColumn::PublicationYear => "publication_year",
            SchemaColumn::GenderMale => "gender_male",
            SchemaColumn::RaceWhite => "race_white",
            SchemaColumn::RegionWest => "region_west",
            SchemaColumn::Top100 => "top_100",
            SchemaColumn::AvgC2 => "avg_c2",
            SchemaColumn::WorkCount => "work_count",
            SchemaColumn::SourceNature => "source_nature",
            SchemaColumn::DaysReceivedToAccepted => "days_received_to_accepted",
            SchemaColumn::WeightedAppreciative => "Weighted_Appreciative",
            SchemaColumn::WeightedConstructive => "Weighted_Constructive",
            SchemaColumn::WeightedQuestioning => "Weighted_Questioning",
            SchemaColumn::WeightedCritical => "Weighted_Critical",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// One one-hot field indicator column, e.g. `field_Biology`.
#[derive(Debug, Clone)]
pub struct FieldIndicator {
    pub name: String,
    pub values: Array1<f64>,
}

/// How the loader reads the file and recognises field indicators.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub separator: u8,
    pub field_prefix: String,
    pub reference_field: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            separator: b',',
            field_prefix: "field_".to_string(),
            reference_field: "field_Medicine".to_string(),
        }
    }
}

/// The loaded dataset: every schema column plus the field indicators, all
/// coerced to `f64` with `NaN` standing for a missing value.
#[derive(Debug, Clone)]
pub struct ReviewTable {
    n_rows: usize,
    columns: Vec<Array1<f64>>,
    fields: Vec<FieldIndicator>,
    reference_field: usize,
}

/// A comprehensive error type for all data loading and validation failures.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Could not open input file '{path}': {source}")]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Input file is not well-formed delimited data: {0}")]
    Parse(#[from] PolarsError),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The reference field '{reference}' is not among the '{prefix}*' columns of the input file."
    )]
    ReferenceFieldMissing { reference: String, prefix: String },
    #[error("Column '{column}' has {found} values, but the table has {expected} rows.")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("The input file contains a header but no data rows.")]
    EmptyTable,
}

/// Tokens read as a missing value without counting as a coercion failure.
const MISSING_TOKENS: [&str; 8] = ["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

impl ReviewTable {
    /// Assembles a table from already-coerced columns. Every schema column must
    /// be present, every column must share one length, and `reference_field`
    /// must name one of `fields`.
    pub fn from_columns(
        mut columns: HashMap<SchemaColumn, Array1<f64>>,
        fields: Vec<FieldIndicator>,
        reference_field: &str,
    ) -> Result<Self, DataError> {
        let mut ordered = Vec::with_capacity(SchemaColumn::ALL.len());
        for column in SchemaColumn::ALL {
            let values = columns
                .remove(&column)
                .ok_or_else(|| DataError::ColumnNotFound(column.name().to_string()))?;
            ordered.push(values);
        }

        let n_rows = ordered[0].len();
        let lengths = SchemaColumn::ALL
            .iter()
            .map(|column| column.name())
            .zip(ordered.iter().map(|values| values.len()))
            .chain(fields.iter().map(|f| (f.name.as_str(), f.values.len())));
        for (name, found) in lengths {
            if found != n_rows {
                return Err(DataError::LengthMismatch {
                    column: name.to_string(),
                    expected: n_rows,
                    found,
                });
            }
        }

        let reference_index = fields
            .iter()
            .position(|f| f.name == reference_field)
            .ok_or_else(|| DataError::ReferenceFieldMissing {
                reference: reference_field.to_string(),
                prefix: common_prefix(&fields),
            })?;

        Ok(Self {
            n_rows,
            columns: ordered,
            fields,
            reference_field: reference_index,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn column(&self, column: SchemaColumn) -> ArrayView1<'_, f64> {
        self.columns[column.index()].view()
    }

    /// All field indicators in header order, the reference included.
    pub fn fields(&self) -> &[FieldIndicator] {
        &self.fields
    }

    pub fn reference_field(&self) -> &FieldIndicator {
        &self.fields[self.reference_field]
    }

    /// Indices into `fields()` of every indicator except the reference, in
    /// header order.
    pub fn regressor_fields(&self) -> Vec<usize> {
        (0..self.fields.len())
            .filter(|&i| i != self.reference_field)
            .collect()
    }
}

/// Reads, validates and coerces the dataset at `path`.
pub fn load_review_table(path: &Path, options: &LoadOptions) -> Result<ReviewTable, DataError> {
    log::info!("Loading review records from '{}'", path.display());

    let file = File::open(path).map_err(|source| DataError::FileAccess {
        path: path.to_path_buf(),
        source,
    })?;

    // Every column is read as text; coercion happens below so that a stray
    // token deep in the file becomes a missing value instead of a parse error.
    let df = CsvReader::new(file)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_infer_schema_length(Some(0))
                .with_parse_options(
                    CsvParseOptions::default().with_separator(options.separator),
                ),
        )
        .finish()?;

    if df.height() == 0 {
        return Err(DataError::EmptyTable);
    }

    let header: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let present: HashSet<&str> = header.iter().map(|name| name.as_str()).collect();
    for column in SchemaColumn::ALL {
        if !present.contains(column.name()) {
            return Err(DataError::ColumnNotFound(column.name().to_string()));
        }
    }

    let field_names: Vec<&String> = header
        .iter()
        .filter(|name| name.starts_with(&options.field_prefix))
        .collect();
    if !field_names
        .iter()
        .any(|name| name.as_str() == options.reference_field)
    {
        return Err(DataError::ReferenceFieldMissing {
            reference: options.reference_field.clone(),
            prefix: options.field_prefix.clone(),
        });
    }

    let mut columns = HashMap::with_capacity(SchemaColumn::ALL.len());
    for column in SchemaColumn::ALL {
        columns.insert(column, coerce_column(&df, column.name())?);
    }

    let mut fields = Vec::with_capacity(field_names.len());
    for name in field_names {
        fields.push(FieldIndicator {
            name: name.clone(),
            values: coerce_column(&df, name)?,
        });
    }

    let table = ReviewTable::from_columns(columns, fields, &options.reference_field)?;
    log::info!(
        "Loaded {} rows with {} field indicators (reference: {}).",
        table.n_rows(),
        table.fields().len(),
        table.reference_field().name
    );
    Ok(table)
}

enum Coerced {
    Value(f64),
    Missing,
    Invalid,
}

fn coerce_cell(raw: &str) -> Coerced {
    let trimmed = raw.trim();
    if MISSING_TOKENS.contains(&trimmed) {
        return Coerced::Missing;
    }
    match trimmed {
        "true" | "True" | "TRUE" => return Coerced::Value(1.0),
        "false" | "False" | "FALSE" => return Coerced::Value(0.0),
        _ => {}
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Coerced::Value(value),
        _ => Coerced::Invalid,
    }
}

fn coerce_column(df: &DataFrame, name: &str) -> Result<Array1<f64>, DataError> {
    let text = df.column(name)?.str()?;
    let mut invalid = 0usize;
    let values: Array1<f64> = text
        .into_iter()
        .map(|cell| match cell.map(coerce_cell) {
            Some(Coerced::Value(value)) => value,
            None | Some(Coerced::Missing) => f64::NAN,
            Some(Coerced::Invalid) => {
                invalid += 1;
                f64::NAN
            }
        })
        .collect();

    if invalid > 0 {
        log::warn!("Column '{name}': {invalid} values could not be read as numbers and are treated as missing.");
    }
    Ok(values)
}

fn common_prefix(fields: &[FieldIndicator]) -> String {
    fields
        .first()
        .and_then(|f| f.name.find('_').map(|i| f.name[..=i].to_string()))
        .unwrap_or_default()
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::{self, Write};
    use tempfile::NamedTempFile;

    /// A robust helper to create a temporary CSV file for testing.
    fn create_test_csv(content: &str) -> io::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "{}", content)?;
        file.flush()?;
        Ok(file)
    }

    fn full_header(extra: &[&str]) -> String {
        let mut names: Vec<&str> = SchemaColumn::ALL.iter().map(|c| c.name()).collect();
        names.extend_from_slice(extra);
        names.join(",")
    }

    /// One data row in `SchemaColumn::ALL` order followed by `field_Biology`,
    /// `field_Medicine`.
    fn data_row(disclosed: &str, authors: &str, tone: &str) -> String {
        format!(
            "{disclosed},{authors},12,140,2019,True,0,1,False,3.5,42,1,120,{tone},0.2,0.1,0.05,1,0"
        )
    }

    #[test]
    fn test_load_review_table_success() {
        let header = full_header(&["field_Biology", "field_Medicine"]);
        let rows = [
            data_row("1", "3", "0.5"),
            data_row("0", "7", "0.25"),
            data_row("True", "2", "0.75"),
        ];
        let content = format!("{}\n{}", header, rows.join("\n"));
        let file = create_test_csv(&content).unwrap();

        let table = load_review_table(file.path(), &LoadOptions::default()).unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.fields().len(), 2);
        assert_eq!(table.reference_field().name, "field_Medicine");
        assert_eq!(table.regressor_fields(), vec![0]);
        assert_eq!(table.fields()[0].name, "field_Biology");

        let disclosed = table.column(SchemaColumn::DisclosedReviewer);
        assert_abs_diff_eq!(disclosed[0], 1.0);
        assert_abs_diff_eq!(disclosed[1], 0.0);
        assert_abs_diff_eq!(disclosed[2], 1.0);

        // Booleans spelled as words become indicators.
        assert_abs_diff_eq!(table.column(SchemaColumn::GenderMale)[0], 1.0);
        assert_abs_diff_eq!(table.column(SchemaColumn::Top100)[0], 0.0);
        assert_abs_diff_eq!(table.column(SchemaColumn::AvgC2)[1], 3.5);
        assert_abs_diff_eq!(table.column(Tone::Appreciative.schema_column())[2], 0.75);
    }

    #[test]
    fn test_uncoercible_values_become_missing() {
        let header = full_header(&["field_Biology", "field_Medicine"]);
        let rows = [
            data_row("1", "many", "0.5"),
            data_row("0", "4", ""),
            data_row("1", "5", "inf"),
        ];
        let content = format!("{}\n{}", header, rows.join("\n"));
        let file = create_test_csv(&content).unwrap();

        let table = load_review_table(file.path(), &LoadOptions::default()).unwrap();

        let authors = table.column(SchemaColumn::TotalAuthors);
        assert!(authors[0].is_nan());
        assert_abs_diff_eq!(authors[1], 4.0);

        let tone = table.column(SchemaColumn::WeightedAppreciative);
        assert_abs_diff_eq!(tone[0], 0.5);
        assert!(tone[1].is_nan());
        assert!(tone[2].is_nan());
    }

    #[test]
    fn test_error_column_not_found() {
        let header = full_header(&["field_Biology", "field_Medicine"]).replace("avg_c2,", "");
        let row = data_row("1", "3", "0.5").replace(",3.5,", ",");
        let content = format!("{}\n{}", header, row);
        let file = create_test_csv(&content).unwrap();
        match load_review_table(file.path(), &LoadOptions::default()) {
            Err(DataError::ColumnNotFound(col)) => assert_eq!(col, "avg_c2"),
            other => panic!("Expected ColumnNotFound(avg_c2), got {:?}", other),
        }
    }

    #[test]
    fn test_error_reference_field_missing() {
        let header = full_header(&["field_Biology", "field_Physics"]);
        let content = format!("{}\n{}", header, data_row("1", "3", "0.5"));
        let file = create_test_csv(&content).unwrap();
        match load_review_table(file.path(), &LoadOptions::default()) {
            Err(DataError::ReferenceFieldMissing { reference, prefix }) => {
                assert_eq!(reference, "field_Medicine");
                assert_eq!(prefix, "field_");
            }
            other => panic!("Expected ReferenceFieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_error_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.csv");
        match load_review_table(&path, &LoadOptions::default()) {
            Err(DataError::FileAccess { path: reported, .. }) => assert_eq!(reported, path),
            other => panic!("Expected FileAccess, got {:?}", other),
        }
    }

    #[test]
    fn test_error_header_only() {
        let file = create_test_csv(&full_header(&["field_Medicine"])).unwrap();
        assert!(matches!(
            load_review_table(file.path(), &LoadOptions::default()),
            Err(DataError::EmptyTable)
        ));
    }

    #[test]
    fn test_tab_separated_input() {
        let header = full_header(&["field_Biology", "field_Medicine"]).replace(',', "\t");
        let row = data_row("0", "9", "0.4").replace(',', "\t");
        let file = create_test_csv(&format!("{header}\n{row}")).unwrap();
        let options = LoadOptions {
            separator: b'\t',
            ..LoadOptions::default()
        };
        let table = load_review_table(file.path(), &options).unwrap();
        assert_abs_diff_eq!(table.column(SchemaColumn::TotalAuthors)[0], 9.0);
    }

    #[test]
    fn test_from_columns_rejects_ragged_columns() {
        let mut columns: HashMap<SchemaColumn, Array1<f64>> = SchemaColumn::ALL
            .iter()
            .map(|&c| (c, Array1::zeros(4)))
            .collect();
        columns.insert(SchemaColumn::AcademicAge, Array1::zeros(3));
        let fields = vec![FieldIndicator {
            name: "field_Medicine".to_string(),
            values: Array1::zeros(4),
        }];
        match ReviewTable::from_columns(columns, fields, "field_Medicine") {
            Err(DataError::LengthMismatch {
                column,
                expected,
                found,
            }) => {
                assert_eq!(column, "academic_age");
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("Expected LengthMismatch, got {:?}", other),
        }
    }
}
