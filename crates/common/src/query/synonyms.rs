//! Synonym normalization for search tokens
//!
//! Maps shorthand a student would type ("3", "third", "sem", "phy") onto the
//! spelling used in the catalog ("III", "semester", "physics").

/// Fixed synonym table, keyed by lower-case token
const SYNONYMS: &[(&str, &str)] = &[
    // Arabic numerals
    ("1", "I"),
    ("2", "II"),
    ("3", "III"),
    ("4", "IV"),
    ("5", "V"),
    ("6", "VI"),
    ("7", "VII"),
    ("8", "VIII"),
    ("9", "IX"),
    ("10", "X"),
    // Cardinals
    ("one", "I"),
    ("two", "II"),
    ("three", "III"),
    ("four", "IV"),
    ("five", "V"),
    ("six", "VI"),
    ("seven", "VII"),
    ("eight", "VIII"),
    // Ordinals
    ("first", "I"),
    ("second", "II"),
    ("third", "III"),
    ("fourth", "IV"),
    ("fifth", "V"),
    ("3rd", "III"),
    // Lower-case roman numerals
    ("i", "I"),
    ("ii", "II"),
    ("iii", "III"),
    ("iv", "IV"),
    ("v", "V"),
    ("vi", "VI"),
    ("vii", "VII"),
    ("viii", "VIII"),
    ("ix", "IX"),
    ("x", "X"),
    // Semester
    ("sem", "semester"),
    ("semester", "semester"),
    // Subject abbreviations
    ("phy", "physics"),
    ("pys", "psychology"),
    ("env", "environmental"),
    ("sci", "science"),
    ("his", "history"),
    ("eco", "economics"),
    ("stats", "statistics"),
    ("biotech", "biotechnology"),
    ("cs", "computer"),
    ("ps", "political"),
    ("geo", "geography"),
    ("zoo", "zoology"),
    ("bot", "botany"),
    ("eng", "english"),
    ("hin", "hindi"),
    ("chem", "chemistry"),
];

/// Translate a lower-cased token to its canonical form.
///
/// Tokens missing from the table come back unchanged.
pub fn normalize(token: &str) -> &str {
    lookup(token).unwrap_or(token)
}

fn lookup(token: &str) -> Option<&'static str> {
    SYNONYMS
        .iter()
        .find(|(key, _)| *key == token)
        .map(|(_, canonical)| *canonical)
}
