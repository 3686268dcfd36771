//! Free-text search over the paper catalog
//!
//! - `synonyms`: fixed shorthand table ("3rd" -> "III", "phy" -> "physics")
//! - `filter`: compiles normalized terms into a [`CompiledFilter`]

mod filter;
mod synonyms;

pub use filter::{
    compile, compile_terms, Clause, ColumnValues, CompiledFilter, MatchOperator, Predicate,
    SearchColumn, SEARCHABLE_COLUMNS,
};
pub use synonyms::normalize;
