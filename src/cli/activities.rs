use std::sync::{Arc, Mutex};

use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::db::SqliteStore;
use tally::error::{Result, TallyError};
use tally::fetcher::{FetchOutcome, PaginatedFetcher};
use tally::fmt::money;
use tally::models::{ActivityFilters, ActivityPatch, ActivityRecord, Credential};
use tally::settings::{load_settings, Settings};

use super::{credential_or_notice, open_store, parse_day};

pub struct ListArgs {
    pub category: Option<String>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
    pub search: Option<String>,
    pub related_to: Option<String>,
    pub limit: Option<usize>,
}

type LastError = Arc<Mutex<Option<String>>>;

/// A fetcher whose failures are kept so the command can report them.
fn fetcher(
    settings: &Settings,
    credential: Credential,
) -> Result<(PaginatedFetcher<SqliteStore>, LastError)> {
    let store = Arc::new(open_store(settings)?);
    let last_error: LastError = Arc::new(Mutex::new(None));
    let sink = last_error.clone();
    let fetcher = PaginatedFetcher::new(store, settings.page_size)
        .with_credential(Some(credential))
        .with_error_handler(move |e| {
            if let Ok(mut slot) = sink.lock() {
                *slot = Some(e.to_string());
            }
        });
    Ok((fetcher, last_error))
}

fn check(outcome: FetchOutcome, last_error: &LastError) -> Result<()> {
    if outcome != FetchOutcome::Failed {
        return Ok(());
    }
    let message = last_error
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .unwrap_or_else(|| "request failed".to_string());
    Err(TallyError::Other(message))
}

fn print_activities(records: &[ActivityRecord], has_more: bool) {
    if records.is_empty() {
        println!("No activities found.");
        return;
    }
    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Account", "Description", "Category", "Amount"]);
    for r in records {
        let amount = if r.amount < 0.0 {
            money(r.amount).green().to_string()
        } else {
            money(r.amount)
        };
        table.add_row(vec![
            Cell::new(&r.id),
            Cell::new(&r.date),
            Cell::new(&r.account),
            Cell::new(&r.description),
            Cell::new(&r.category),
            Cell::new(amount),
        ]);
    }
    println!("{table}");
    if has_more {
        println!("{}", "More activities available; raise --limit to see them.".dimmed());
    }
}

pub async fn list(args: ListArgs) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let filters = ActivityFilters {
        category: args.category,
        start_date: args.from_date.as_deref().map(parse_day).transpose()?,
        end_date: args.to_date.as_deref().map(parse_day).transpose()?,
        description: args.search,
        related_to: args.related_to,
    };
    let limit = args.limit.unwrap_or(settings.page_size);

    let (fetcher, last_error) = fetcher(&settings, credential)?;
    check(fetcher.apply_filters(filters, limit).await, &last_error)?;
    print_activities(&fetcher.records(), fetcher.has_more());
    Ok(())
}

pub async fn edit(id: &str, patch: ActivityPatch) -> Result<()> {
    if patch.is_empty() {
        println!("Nothing to change.");
        return Ok(());
    }
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let (fetcher, last_error) = fetcher(&settings, credential)?;
    check(fetcher.update_record(id, &patch).await, &last_error)?;
    println!("Updated {id}");
    Ok(())
}

pub async fn delete(id: &str, limit: Option<usize>) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };
    let (fetcher, last_error) = fetcher(&settings, credential)?;
    check(
        fetcher.refetch(true, limit.unwrap_or(settings.page_size)).await,
        &last_error,
    )?;
    check(fetcher.remove_record(id).await, &last_error)?;
    println!("Deleted {id}");
    print_activities(&fetcher.records(), fetcher.has_more());
    Ok(())
}
