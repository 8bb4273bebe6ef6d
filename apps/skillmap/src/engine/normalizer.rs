//! Competency Normalizer: canonical casing, multi-value splitting and
//! de-duplication for one entity's competency list.

use std::collections::HashSet;

use crate::models::RawCompetency;

/// Placeholder meaning "no competency identified". Never survives normalization.
pub const NO_COMPETENCY: &str = "-";

/// Slash-joined entries shorter than this are treated as several technologies
/// ("Unity/Unreal Engine"); longer ones are assumed to be prose.
const SLASH_SPLIT_MAX_CHARS: usize = 40;

/// All-uppercase tokens up to this length are kept verbatim as acronyms.
const ACRONYM_MAX_CHARS: usize = 6;

const VALUE_DELIMITER: char = ',';

/// Normalizes one entity's raw competencies. Output is order-preserving on
/// first occurrence and free of blanks, sentinels and exact duplicates.
pub fn normalize(raw: &[RawCompetency]) -> Vec<String> {
    normalize_names(raw.iter().filter_map(RawCompetency::name))
}

/// Same as [`normalize`] for plain strings (extractor output).
pub fn normalize_strings<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    normalize_names(raw.iter().map(AsRef::as_ref))
}

fn normalize_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cleaned = Vec::new();

    for name in names {
        let name = name.trim();
        if name.is_empty() || name == NO_COMPETENCY {
            continue;
        }
        for token in split_entry(name) {
            let Some(canonical) = canonicalize(token) else {
                continue;
            };
            if seen.insert(canonical.clone()) {
                cleaned.push(canonical);
            }
        }
    }

    cleaned
}

/// Splits "Python, SQL" on commas and short "Unity/Unreal Engine" chunks on slashes.
fn split_entry(entry: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    for chunk in entry.split(VALUE_DELIMITER).map(str::trim) {
        if chunk.is_empty() {
            continue;
        }
        if chunk.contains('/') && chunk.chars().count() < SLASH_SPLIT_MAX_CHARS {
            parts.extend(chunk.split('/').map(str::trim).filter(|s| !s.is_empty()));
        } else {
            parts.push(chunk);
        }
    }
    parts
}

/// Canonical spelling of a single token, or `None` if nothing is left after
/// stripping quotes and whitespace.
pub fn canonicalize(token: &str) -> Option<String> {
    let token = token.trim().trim_matches(|c| matches!(c, '"' | '\'' | ' '));
    if token.is_empty() || token == NO_COMPETENCY {
        return None;
    }

    if let Some(known) = synonym(&token.to_lowercase()) {
        return Some(known.to_string());
    }

    if is_acronym(token) {
        return Some(token.to_string());
    }

    let mut chars = token.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

fn is_acronym(token: &str) -> bool {
    token.chars().count() <= ACRONYM_MAX_CHARS
        && token.chars().any(char::is_uppercase)
        && !token.chars().any(char::is_lowercase)
}

fn synonym(lower: &str) -> Option<&'static str> {
    let canonical = match lower {
        "python" => "Python",
        "java" => "Java",
        "c#" => "C#",
        "c++" => "C++",
        "c" => "C",
        "javascript" | "js" => "JavaScript",
        "typescript" => "TypeScript",
        "nodejs" | "node js" | "node.js" => "Node.js",
        "react" => "React",
        "vue" => "Vue",
        "angular" => "Angular",
        "django" => "Django",
        "flask" => "Flask",
        "fastapi" => "FastAPI",
        "sql" => "SQL",
        "postgresql" | "postgress" => "PostgreSQL",
        "mysql" => "MySQL",
        "mongodb" => "MongoDB",
        "redis" => "Redis",
        "docker" => "Docker",
        "kubernetes" => "Kubernetes",
        "aws" => "AWS",
        "gcp" => "GCP",
        "azure" => "Azure",
        "llm" => "LLM",
        "ml" => "ML",
        "nlp" => "NLP",
        "eda" => "EDA",
        "datascience" => "Data Science",
        "unity" => "Unity",
        "unreal engine" => "Unreal Engine",
        "webgl" => "WebGL",
        "3d" => "3D",
        // Cyrillic "с" shows up in Russian-language postings.
        "1c" | "1с" => "1C",
        _ => return None,
    };
    Some(canonical)
}
