use comfy_table::{Cell, Table};

use tally::categorizer::{CategoryMapping, MATCH_TYPES};
use tally::error::{Result, TallyError};
use tally::settings::load_settings;

use super::{credential_or_notice, open_store};

pub fn add(pattern: &str, category: &str, match_type: &str) -> Result<()> {
    if !MATCH_TYPES.contains(&match_type) {
        return Err(TallyError::Other(format!(
            "Unknown match type '{match_type}' (expected one of: {})",
            MATCH_TYPES.join(", ")
        )));
    }
    if match_type == "regex" {
        regex::Regex::new(pattern)
            .map_err(|e| TallyError::Other(format!("Invalid regex: {e}")))?;
    }
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let store = open_store(&settings)?;
    store.add_mapping(
        &credential,
        &CategoryMapping {
            pattern: pattern.to_string(),
            category: category.to_string(),
            match_type: match_type.to_string(),
        },
    )?;
    println!("Added mapping: '{pattern}' \u{2192} {category}");
    Ok(())
}

pub fn list() -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let mappings = open_store(&settings)?.list_mappings(&credential)?;

    let mut table = Table::new();
    table.set_header(vec!["#", "Pattern", "Type", "Category"]);
    for (i, m) in mappings.into_iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(m.pattern),
            Cell::new(m.match_type),
            Cell::new(m.category),
        ]);
    }
    println!("Mappings\n{table}");
    Ok(())
}
