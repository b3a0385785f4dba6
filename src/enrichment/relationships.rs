//! Relationship tag parsing and expansion.
//!
//! Relationship tags come in three notations: romantic (`A/B`), platonic
//! (`A & B`) and the informal `A x B`. A tag may mix notations and may name
//! more than two participants, so every separator occurrence is a split
//! point.

/// Separators recognised between participants of a relationship tag
pub const RELATIONSHIP_SEPARATORS: [&str; 3] = ["/", " & ", " x "];

/// Split a relationship tag into its participant character names.
///
/// Names are trimmed, empty fragments dropped and duplicates (ignoring case)
/// removed while keeping the first-seen spelling. Blank input yields an empty list.
pub fn parse_characters(relationship: &str) -> Vec<String> {
    let mut fragments = vec![relationship];
    for separator in RELATIONSHIP_SEPARATORS {
        fragments = fragments
            .into_iter()
            .flat_map(|fragment| fragment.split(separator))
            .collect();
    }

    let mut characters: Vec<String> = Vec::new();
    for name in fragments.into_iter().map(str::trim) {
        if !name.is_empty() && !characters.iter().any(|c| c.eq_ignore_ascii_case(name)) {
            characters.push(name.to_string());
        }
    }
    characters
}

/// Candidate relationship tags for every unordered pair of characters.
///
/// Each pair yields a romantic `A/B` and a platonic `A & B` candidate. The
/// candidates are suggestions, not known tags.
pub fn expand_relationships(characters: &[String]) -> Vec<String> {
    let mut unique: Vec<&str> = Vec::new();
    for name in characters.iter().map(|c| c.trim()) {
        if !name.is_empty() && !unique.iter().any(|u| u.eq_ignore_ascii_case(name)) {
            unique.push(name);
        }
    }

    let mut candidates = Vec::new();
    for (i, first) in unique.iter().enumerate() {
        for second in &unique[i + 1..] {
            candidates.push(format!("{}/{}", first, second));
            candidates.push(format!("{} & {}", first, second));
        }
    }
    candidates
}

/// Union of the participants of every relationship, first-seen order
pub fn implied_characters(relationships: &[String]) -> Vec<String> {
    let mut characters: Vec<String> = Vec::new();
    for relationship in relationships {
        for name in parse_characters(relationship) {
            if !contains_ignore_case(&characters, &name) {
                characters.push(name);
            }
        }
    }
    characters
}

/// Widen a character filter with the participants of the given relationships
pub fn expand_character_filter(characters: &[String], relationships: &[String]) -> Vec<String> {
    let mut expanded: Vec<String> = Vec::new();
    for name in characters.iter().cloned().chain(implied_characters(relationships)) {
        if !name.trim().is_empty() && !contains_ignore_case(&expanded, &name) {
            expanded.push(name);
        }
    }
    expanded
}

/// Case-insensitive membership test used for tag comparisons
pub fn contains_ignore_case(haystack: &[String], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    haystack.iter().any(|h| h.trim().to_lowercase() == needle)
}
