//! Lexical query preprocessing (component E).

/// A small whitelist of programming-domain synonyms. Each entry expands
/// in both directions.
const SYNONYMS: &[(&str, &str)] = &[
    ("auth", "authentication"),
    ("auth", "login"),
    ("authentication", "login"),
    ("db", "database"),
    ("config", "configuration"),
    ("config", "settings"),
    ("func", "function"),
    ("fn", "function"),
    ("err", "error"),
    ("msg", "message"),
    ("req", "request"),
    ("resp", "response"),
    ("impl", "implementation"),
];

/// Single-edit neighbors considered for fuzzy matching, restricted to
/// common programming terms (a full edit-distance search over the
/// corpus would be too slow to run per query).
const FUZZY_WHITELIST: &[&str] = &[
    "query", "queue", "cache", "token", "route", "state", "store", "scope", "index", "retry",
];

/// Split `identifier` on CamelCase and snake_case boundaries.
fn split_identifier(identifier: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();

    for ch in identifier.chars() {
        if ch == '_' || ch == '-' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if ch.is_uppercase() && !current.is_empty() && !current.chars().last().unwrap().is_uppercase() {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn synonyms_of(token: &str) -> Vec<String> {
    let mut out = Vec::new();
    for (a, b) in SYNONYMS {
        if *a == token {
            out.push((*b).to_string());
        } else if *b == token {
            out.push((*a).to_string());
        }
    }
    out
}

fn fuzzy_variants(token: &str) -> Vec<String> {
    FUZZY_WHITELIST
        .iter()
        .filter(|candidate| is_single_edit(token, candidate))
        .map(|s| s.to_string())
        .collect()
}

fn is_single_edit(a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    if a.len().abs_diff(b.len()) > 1 {
        return false;
    }
    if a.len() == b.len() {
        a.iter().zip(&b).filter(|(x, y)| x != y).count() == 1
    } else {
        let (shorter, longer) = if a.len() < b.len() { (&a, &b) } else { (&b, &a) };
        let mut i = 0;
        let mut j = 0;
        let mut mismatches = 0;
        while i < shorter.len() && j < longer.len() {
            if shorter[i] == longer[j] {
                i += 1;
                j += 1;
            } else {
                mismatches += 1;
                if mismatches > 1 {
                    return false;
                }
                j += 1;
            }
        }
        true
    }
}

/// Whether `raw` should be treated as an exact phrase (contains code
/// punctuation that tokenization would destroy).
pub fn is_exact_phrase(raw: &str) -> bool {
    const MARKERS: &[char] = &['.', '(', ')', '[', ']', '{', '}'];
    raw.contains(MARKERS) || raw.contains("::") || raw.contains("->")
}

/// Build an FTS5 MATCH expression from a raw query string, per the
/// preprocessing rules (exact phrase detection, CamelCase/snake_case
/// splitting, synonym expansion, prefix terms, optional fuzzy variants).
pub fn build_fts_query(raw: &str, fuzzy: bool) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if is_exact_phrase(trimmed) {
        let escaped = trimmed.replace('"', "\"\"");
        return Some(format!("\"{escaped}\""));
    }

    let mut terms: Vec<String> = Vec::new();
    for word in trimmed.split_whitespace() {
        for token in split_identifier(word) {
            let token = token.to_lowercase();
            if token.chars().count() < 2 {
                continue;
            }
            terms.push(format!("\"{token}\"*"));
            for synonym in synonyms_of(&token) {
                terms.push(format!("\"{synonym}\"*"));
            }
            if fuzzy && token.chars().count() >= 5 {
                for variant in fuzzy_variants(&token) {
                    terms.push(format!("\"{variant}\"*"));
                }
            }
        }
    }

    if terms.is_empty() {
        return None;
    }
    terms.dedup();
    Some(terms.join(" OR "))
}
