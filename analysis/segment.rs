//! Derives the scaled publication year and the three reviewer segments.
//!
//! Segments are row-index views over the loaded table; nothing is copied or
//! mutated. A row whose predicate column is missing never satisfies that
//! predicate, so it falls out of every segment.

use crate::data::{ReviewTable, SchemaColumn};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

/// The three reviewer segments, in the order their models are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Disclosed,
    Anon,
    Full,
}

impl SegmentKind {
    pub const ALL: [SegmentKind; 3] = [SegmentKind::Disclosed, SegmentKind::Anon, SegmentKind::Full];

    pub fn name(self) -> &'static str {
        match self {
            SegmentKind::Disclosed => "disclosed",
            SegmentKind::Anon => "anon",
            SegmentKind::Full => "full",
        }
    }

    /// The `disclosed_reviewer` value a row must carry, if any.
    pub fn disclosure(self) -> Option<f64> {
        match self {
            SegmentKind::Disclosed => Some(1.0),
            SegmentKind::Anon => Some(0.0),
            SegmentKind::Full => None,
        }
    }
}

/// Structural predicates shared by all three segments.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SegmentFilters {
    pub min_authors: f64,
    pub max_authors: f64,
    pub max_academic_age: f64,
    pub min_effective_words: f64,
}

impl Default for SegmentFilters {
    fn default() -> Self {
        Self {
            min_authors: 1.0,
            max_authors: 20.0,
            max_academic_age: 80.0,
            min_effective_words: 5.0,
        }
    }
}

impl SegmentFilters {
    fn admits(&self, authors: f64, academic_age: f64, effective_words: f64) -> bool {
        // Comparisons against NaN are false, which excludes missing values.
        authors >= self.min_authors
            && authors <= self.max_authors
            && academic_age <= self.max_academic_age
            && effective_words >= self.min_effective_words
    }
}

#[derive(Debug, Clone)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Indices into the source table, ascending.
    pub rows: Vec<usize>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The loaded table together with everything derived from it before fitting.
#[derive(Debug)]
pub struct SegmentedData<'a> {
    table: &'a ReviewTable,
    pub_year_scaled: Array1<f64>,
    segments: Vec<Segment>,
}

impl<'a> SegmentedData<'a> {
    pub fn table(&self) -> &'a ReviewTable {
        self.table
    }

    /// `publication_year - min(publication_year) + 1`, computed over the whole
    /// table and indexed like it.
    pub fn pub_year_scaled(&self) -> ArrayView1<'_, f64> {
        self.pub_year_scaled.view()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment(&self, kind: SegmentKind) -> &Segment {
        // `segment_table` builds one segment per kind, in declaration order.
        &self.segments[kind as usize]
    }
}

/// Rescales publication years so the earliest year in the table is 1. Missing
/// years stay missing and do not take part in the minimum.
pub fn scale_publication_year(years: ArrayView1<f64>) -> Array1<f64> {
    let min_year = years
        .iter()
        .copied()
        .filter(|y| !y.is_nan())
        .fold(f64::INFINITY, f64::min);
    if !min_year.is_finite() {
        return Array1::from_elem(years.len(), f64::NAN);
    }
    years.mapv(|y| y - min_year + 1.0)
}

/// Builds the three segments over `table`.
pub fn segment_table<'a>(table: &'a ReviewTable, filters: &SegmentFilters) -> SegmentedData<'a> {
    let pub_year_scaled = scale_publication_year(table.column(SchemaColumn::PublicationYear));

    let authors = table.column(SchemaColumn::TotalAuthors);
    let academic_age = table.column(SchemaColumn::AcademicAge);
    let effective_words = table.column(SchemaColumn::EffectiveWords);
    let disclosed = table.column(SchemaColumn::DisclosedReviewer);

    let structural: Vec<bool> = (0..table.n_rows())
        .map(|i| filters.admits(authors[i], academic_age[i], effective_words[i]))
        .collect();

    let segments: Vec<Segment> = SegmentKind::ALL
        .iter()
        .map(|&kind| {
            let rows: Vec<usize> = structural
                .iter()
                .enumerate()
                .filter(|&(i, &passes)| {
                    passes && kind.disclosure().is_none_or(|flag| disclosed[i] == flag)
                })
                .map(|(i, _)| i)
                .collect();
            if rows.is_empty() {
                log::warn!("Segment '{}' is empty after filtering.", kind.name());
            }
            log::info!("Segment '{}': {} rows.", kind.name(), rows.len());
            Segment { kind, rows }
        })
        .collect();

    SegmentedData {
        table,
        pub_year_scaled,
        segments,
    }
}
