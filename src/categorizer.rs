use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::ActivityRecord;

pub const MATCH_TYPES: &[&str] = &["contains", "starts_with", "regex"];

/// Assigns `category` to any record whose description matches `pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    pub pattern: String,
    pub category: String,
    pub match_type: String,
}

fn matches(description: &str, pattern: &str, match_type: &str) -> bool {
    let desc_upper = description.to_uppercase();
    let pat_upper = pattern.to_uppercase();
    match match_type {
        "contains" => desc_upper.contains(&pat_upper),
        "starts_with" => desc_upper.starts_with(&pat_upper),
        "regex" => Regex::new(pattern)
            .map(|re| re.is_match(description))
            .unwrap_or(false),
        _ => false,
    }
}

/// First mapping (in order) that matches the description.
pub fn find_mapping<'a>(
    description: &str,
    mappings: &'a [CategoryMapping],
) -> Option<&'a CategoryMapping> {
    mappings
        .iter()
        .find(|m| matches(description, &m.pattern, &m.match_type))
}

pub struct CategorizeResult {
    pub records: Vec<ActivityRecord>,
    pub categorized: usize,
}

/// Returns new records with mapped categories. Records without a match pass through unchanged.
pub fn apply_mappings(
    records: &[ActivityRecord],
    mappings: &[CategoryMapping],
) -> CategorizeResult {
    let mut categorized = 0usize;
    let records = records
        .iter()
        .map(|r| match find_mapping(&r.description, mappings) {
            Some(m) => {
                categorized += 1;
                r.with_category(m.category.clone())
            }
            None => r.clone(),
        })
        .collect();
    CategorizeResult {
        records,
        categorized,
    }
}
