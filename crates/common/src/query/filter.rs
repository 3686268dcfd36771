//! Query compiler
//!
//! Turns a free-text search string into a [`CompiledFilter`]: a conjunction
//! (one clause per search term) of disjunctions (one predicate per searchable
//! column). The filter only names columns, operators and positional values;
//! storage backends render it into their own query language.
//!
//! Case folding is ASCII-only, the same rule SQLite applies in `LOWER` and
//! `LIKE`, so a filter selects the same rows in memory and in the database.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::synonyms::normalize;

/// Columns a search term is matched against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchColumn {
    Class,
    Subject,
    Semester,
    ExamYear,
    ExamType,
    PaperCode,
    ExamNumber,
    Medium,
    University,
    UploaderName,
}

/// Every column searched by a free-text query, in match order
pub const SEARCHABLE_COLUMNS: [SearchColumn; 10] = [
    SearchColumn::Class,
    SearchColumn::Subject,
    SearchColumn::Semester,
    SearchColumn::ExamYear,
    SearchColumn::ExamType,
    SearchColumn::PaperCode,
    SearchColumn::ExamNumber,
    SearchColumn::Medium,
    SearchColumn::University,
    SearchColumn::UploaderName,
];

impl SearchColumn {
    /// Storage column name
    pub fn name(&self) -> &'static str {
        match self {
            SearchColumn::Class => "class",
            SearchColumn::Subject => "subject",
            SearchColumn::Semester => "semester",
            SearchColumn::ExamYear => "exam_year",
            SearchColumn::ExamType => "exam_type",
            SearchColumn::PaperCode => "paper_code",
            SearchColumn::ExamNumber => "exam_number",
            SearchColumn::Medium => "medium",
            SearchColumn::University => "university",
            SearchColumn::UploaderName => "uploader_name",
        }
    }
}

impl fmt::Display for SearchColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Read access to a row's searchable text, for in-memory evaluation
pub trait ColumnValues {
    fn column_value(&self, column: SearchColumn) -> &str;
}

/// Comparison applied between a column and a bound value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOperator {
    /// ASCII-folded column contains the (already folded) value anywhere
    ContainsIgnoreCase,
}

/// One `column OP values[value]` comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: SearchColumn,
    pub operator: MatchOperator,
    /// Index into [`CompiledFilter::values`]
    pub value: usize,
}

/// Predicates OR-ed together; all produced from a single search term
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub predicates: Vec<Predicate>,
}

/// Engine-independent search predicate.
///
/// Clauses are AND-ed. No clauses means "match everything".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompiledFilter {
    terms: Vec<String>,
    values: Vec<String>,
    clauses: Vec<Clause>,
}

impl CompiledFilter {
    /// The filter that matches every record
    pub fn match_all() -> Self {
        Self::default()
    }

    pub fn is_match_all(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Canonical search terms, after synonym translation
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Positional bound values referenced by predicates
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Value bound to a predicate, `None` for an index outside this filter
    pub fn value_of(&self, predicate: &Predicate) -> Option<&str> {
        self.values.get(predicate.value).map(String::as_str)
    }

    /// Evaluate the filter against a row held in memory
    pub fn matches<R: ColumnValues + ?Sized>(&self, row: &R) -> bool {
        self.clauses.iter().all(|clause| {
            clause.predicates.iter().any(|predicate| {
                let Some(needle) = self.value_of(predicate) else {
                    return false;
                };
                match predicate.operator {
                    MatchOperator::ContainsIgnoreCase => row
                        .column_value(predicate.column)
                        .to_ascii_lowercase()
                        .contains(needle),
                }
            })
        })
    }
}

/// Compile a raw search string against every searchable column.
///
/// The string is ASCII lower-cased, split on whitespace and each token
/// normalized through the synonym table before compilation.
pub fn compile(raw: &str) -> CompiledFilter {
    let lowered = raw.to_ascii_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().map(normalize).collect();
    compile_terms(&tokens, &SEARCHABLE_COLUMNS)
}

/// Compile already-normalized tokens against the given columns.
///
/// Tokens that are empty after trimming are dropped; if none remain the
/// result is [`CompiledFilter::match_all`].
pub fn compile_terms<S: AsRef<str>>(tokens: &[S], columns: &[SearchColumn]) -> CompiledFilter {
    let mut filter = CompiledFilter::default();

    for token in tokens {
        let term = token.as_ref().trim();
        if term.is_empty() {
            continue;
        }

        let value = filter.values.len();
        filter.values.push(term.to_ascii_lowercase());
        filter.terms.push(term.to_string());
        filter.clauses.push(Clause {
            predicates: columns
                .iter()
                .map(|&column| Predicate {
                    column,
                    operator: MatchOperator::ContainsIgnoreCase,
                    value,
                })
                .collect(),
        });
    }

    filter
}
