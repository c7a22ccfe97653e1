//! Query-text helpers: term extraction, matched-term picking, casing.

use std::collections::HashSet;

use lazy_static::lazy_static;

lazy_static! {
    /// Stopwords never surfaced as query terms.
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "and", "for", "are", "was", "were", "with", "that", "this",
        "have", "has", "had", "but", "not", "you", "all", "can", "could",
        "did", "does", "how", "its", "our", "out", "she", "they", "them",
        "what", "when", "where", "which", "who", "why", "will", "would",
        "your", "about", "into", "than", "then", "there", "these", "those",
        "from", "been", "being", "should", "shall", "may", "might", "must",
        "any", "each", "own", "same", "some", "such", "too", "very", "just",
        "now", "over", "under", "between", "because", "while", "before",
        "after", "above", "below", "again", "once", "here", "only", "other",
        "most", "more", "also", "both", "during", "off", "down", "use",
        "used", "using", "get", "got", "one", "two", "way", "like", "make",
        "made", "need", "needs", "want", "let", "lets", "please",
    ]
    .into_iter()
    .collect();
}

/// Extract query terms: lowercase, at least 3 chars, stopword-filtered,
/// deduplicated, insertion order preserved.
pub fn extract_query_terms(query: &str) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for raw in query
        .to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
    {
        if raw.len() < 3 || STOPWORDS.contains(raw) {
            continue;
        }
        if seen.insert(raw.to_string()) {
            out.push(raw.to_string());
        }
    }
    out
}

/// Pick up to 6 of `terms` that occur as whole words (case-insensitively)
/// in any haystack.
pub fn find_matched_terms(terms: &[String], haystacks: &[&str]) -> Vec<String> {
    let words: HashSet<String> = haystacks
        .iter()
        .flat_map(|h| {
            h.to_lowercase()
                .split(|c: char| !(c.is_alphanumeric() || c == '_'))
                .filter(|w| !w.is_empty())
                .map(|w| w.to_string())
                .collect::<Vec<_>>()
        })
        .collect();
    terms
        .iter()
        .filter(|t| words.contains(t.as_str()))
        .take(6)
        .cloned()
        .collect()
}

/// Format a tag list for display.
pub fn format_tags(tags: &[String]) -> String {
    tags.join(", ")
}

/// Convert a camelCase/PascalCase/snake_case identifier to kebab-case.
/// Runs of capitals are kept together (`HTTPServer` -> `http-server`).
pub fn to_kebab_case(ident: &str) -> String {
    let chars: Vec<char> = ident.chars().collect();
    let mut out = String::with_capacity(ident.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == ' ' {
            if !out.ends_with('-') && !out.is_empty() {
                out.push('-');
            }
            continue;
        }
        if c.is_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if (prev_lower || (prev_upper && next_lower)) && !out.ends_with('-') && !out.is_empty()
            {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// True when the identifier looks like camelCase or PascalCase.
pub fn is_camel_or_pascal(ident: &str) -> bool {
    let has_upper = ident.chars().any(|c| c.is_uppercase());
    let has_lower = ident.chars().any(|c| c.is_lowercase());
    has_upper && has_lower && ident.chars().all(|c| c.is_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terms_are_lowercase_deduped_ordered() {
        let terms = extract_query_terms("What did we Decide about AUTHENTICATION and auth?");
        assert_eq!(terms, vec!["decide", "authentication", "auth"]);
    }

    #[test]
    fn short_and_stopword_terms_drop() {
        assert!(extract_query_terms("is it in an of").is_empty());
        assert!(extract_query_terms("the and for").is_empty());
    }

    #[test]
    fn matched_terms_cap_at_six() {
        let terms: Vec<String> = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let hay = "alpha beta gamma delta epsilon zeta eta";
        let matched = find_matched_terms(&terms, &[hay]);
        assert_eq!(matched.len(), 6);
    }

    #[test]
    fn kebab_case_variants() {
        assert_eq!(to_kebab_case("validateToken"), "validate-token");
        assert_eq!(to_kebab_case("AccessCodeService"), "access-code-service");
        assert_eq!(to_kebab_case("HTTPServer"), "http-server");
        assert_eq!(to_kebab_case("snake_case_name"), "snake-case-name");
    }

    #[test]
    fn camel_detection() {
        assert!(is_camel_or_pascal("validateToken"));
        assert!(is_camel_or_pascal("AccessCode"));
        assert!(!is_camel_or_pascal("plainword"));
        assert!(!is_camel_or_pascal("kebab-case"));
    }
}
