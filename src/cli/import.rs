use std::path::Path;

use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::error::{Result, TallyError};
use tally::fmt::money;
use tally::importer::{self, RawLayout};
use tally::settings::{load_settings, Settings};
use tally::store::ActivityStore;
use tally::upload::{self, SubmitOutcome, UploadPreview};

use super::{credential_or_notice, open_store};

fn chosen_layout(format: Option<&str>) -> Result<Option<RawLayout>> {
    format
        .map(|key| {
            importer::get_by_key(key).ok_or_else(|| TallyError::UnknownFormat(key.to_string()))
        })
        .transpose()
}

async fn build_preview(
    settings: &Settings,
    file: &str,
    format: Option<&str>,
) -> Result<UploadPreview> {
    let text = std::fs::read_to_string(file)?;
    let layout = chosen_layout(format)?;
    let (known, mappings) = match settings.credential() {
        Some(credential) => {
            let store = open_store(settings)?;
            (store.list_uploads(&credential).await?, store.list_mappings(&credential)?)
        }
        None => (Vec::new(), Vec::new()),
    };
    Ok(upload::prepare(
        file,
        &text,
        layout,
        settings.fallback_layout(),
        &known,
        &mappings,
    ))
}

fn print_summary(file: &str, preview: &UploadPreview) {
    let name = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.to_string());
    let how = if preview.detected { "detected" } else { "chosen" };
    println!("{name}: {} ({how})", preview.layout.name());
    if !preview.records.is_empty() {
        println!(
            "{} activities from {} to {}, {} categorized by mappings",
            preview.records.len(),
            preview.start_date,
            preview.end_date,
            preview.categorized
        );
    }
    if preview.duplicate {
        println!("{}", "This file has already been imported.".yellow());
    }
}

pub async fn preview(file: &str, format: Option<&str>) -> Result<()> {
    let settings = load_settings();
    let preview = build_preview(&settings, file, format).await?;
    print_summary(file, &preview);

    if preview.records.is_empty() {
        println!("No activities found.");
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Date", "Account", "Description", "Category", "Amount"]);
    for r in &preview.records {
        table.add_row(vec![
            Cell::new(&r.date),
            Cell::new(&r.account),
            Cell::new(&r.description),
            Cell::new(&r.category),
            Cell::new(money(r.amount)),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn run(file: &str, format: Option<&str>, force: bool) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let preview = build_preview(&settings, file, format).await?;
    print_summary(file, &preview);

    let store = open_store(&settings)?;
    match upload::submit(&store, Some(&credential), &preview, force).await? {
        SubmitOutcome::Submitted { count } => println!("{count} imported"),
        SubmitOutcome::SkippedDuplicate => println!("Skipped. Use --force to import it again."),
        SubmitOutcome::NothingToSubmit => println!("No activities found."),
        SubmitOutcome::NotAuthenticated => println!("Not authenticated."),
    }
    Ok(())
}

pub async fn uploads() -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let store = open_store(&settings)?;
    let uploads = store.list_uploads(&credential).await?;
    if uploads.is_empty() {
        println!("No files imported yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Checksum", "From", "To"]);
    for u in uploads {
        table.add_row(vec![
            Cell::new(&u.checksum[..u.checksum.len().min(12)]),
            Cell::new(u.start_date),
            Cell::new(u.end_date),
        ]);
    }
    println!("Imported files\n{table}");
    Ok(())
}
