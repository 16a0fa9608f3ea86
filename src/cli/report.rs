use chrono::{Local, Months, NaiveDate};
use colored::Colorize;
use comfy_table::{Cell, Table};

use tally::error::{Result, TallyError};
use tally::fmt::{money, percent};
use tally::models::{ActivityFilters, ActivityRecord, Credential};
use tally::reports;
use tally::settings::{load_settings, Settings};
use tally::store::ActivityStore;

use super::{credential_or_notice, open_store, parse_month};

async fn load_records(
    settings: &Settings,
    credential: &Credential,
    filters: &ActivityFilters,
) -> Result<Vec<ActivityRecord>> {
    let store = open_store(settings)?;
    let page = store.retrieve_activities(credential, filters, None, 0).await?;
    Ok(page.records)
}

fn date_range(records: &[ActivityRecord]) -> Option<(NaiveDate, NaiveDate)> {
    let dates: Vec<NaiveDate> = records
        .iter()
        .filter_map(|r| NaiveDate::parse_from_str(&r.date, "%Y-%m-%d").ok())
        .collect();
    Some((*dates.iter().min()?, *dates.iter().max()?))
}

pub async fn categories(month: Option<String>, top: Option<usize>, all: bool) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };

    let mut filters = ActivityFilters::default();
    let title = match &month {
        Some(m) => {
            let first = parse_month(m)?;
            let (start, end) = reports::month_periods(first, first)
                .into_iter()
                .next()
                .ok_or_else(|| TallyError::InvalidFilter(m.clone()))?;
            filters.start_date = Some(start);
            filters.end_date = Some(end);
            format!("Spending by category, {m}")
        }
        None => "Spending by category".to_string(),
    };

    let records = load_records(&settings, &credential, &filters).await?;
    let Some((first, last)) = date_range(&records) else {
        println!("No activities found.");
        return Ok(());
    };
    let periods = reports::summarize_periods(&records, &reports::month_periods(first, last));
    let top_n = if all { None } else { Some(top.unwrap_or(settings.top_categories)) };
    let breakdown = reports::category_breakdown(&periods, top_n);

    let total: f64 = breakdown.iter().map(|e| e.amount).sum();
    let mut table = Table::new();
    table.set_header(vec!["Category", "Amount", "Share"]);
    for entry in &breakdown {
        let name = if entry.category == reports::OTHERS_CATEGORY {
            entry.category.dimmed().to_string()
        } else {
            entry.category.clone()
        };
        table.add_row(vec![
            Cell::new(name),
            Cell::new(money(entry.amount)),
            Cell::new(percent(entry.amount, total)),
        ]);
    }
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(total).bold()),
        Cell::new(""),
    ]);
    println!("{title}\n{table}");
    Ok(())
}

/// Months from `months - 1` before `to` (default: the current month) through `to`.
fn month_window(
    from_month: Option<&str>,
    to_month: Option<&str>,
    months: u32,
) -> Result<Vec<(String, String)>> {
    let to = match to_month {
        Some(m) => parse_month(m)?,
        None => Local::now().date_naive(),
    };
    let from = match from_month {
        Some(m) => parse_month(m)?,
        None => to
            .checked_sub_months(Months::new(months.max(1) - 1))
            .ok_or_else(|| TallyError::InvalidFilter(format!("{months} months")))?,
    };
    if from > to {
        return Err(TallyError::InvalidFilter("--from is after --to".to_string()));
    }
    Ok(reports::month_periods(from, to))
}

fn window_filters(periods: &[(String, String)]) -> ActivityFilters {
    ActivityFilters {
        start_date: periods.first().map(|(start, _)| start.clone()),
        end_date: periods.last().map(|(_, end)| end.clone()),
        ..Default::default()
    }
}

fn month_label(month: &str) -> &str {
    month.get(..7).unwrap_or(month)
}

pub async fn monthly(
    from_month: Option<String>,
    to_month: Option<String>,
    months: u32,
) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };

    let periods = month_window(from_month.as_deref(), to_month.as_deref(), months)?;
    let records = load_records(&settings, &credential, &window_filters(&periods)).await?;
    let mut summaries = reports::summarize_periods(&records, &periods);
    reports::sort_by_recency(&mut summaries);
    let totals = reports::monthly_breakdown(&summaries);

    let mut table = Table::new();
    table.set_header(vec!["Month", "Spending", "Breakdown"]);
    for summary in &summaries {
        let month = reports::monthly_category_breakdown(summary, settings.top_categories);
        let items: Vec<String> = month
            .breakdown
            .iter()
            .filter(|e| e.amount > 0.0)
            .map(|e| format!("{} {}", e.category, money(e.amount)))
            .collect();
        table.add_row(vec![
            Cell::new(month_label(&month.month)),
            Cell::new(money(month.amount)),
            Cell::new(items.join(", ")),
        ]);
    }
    let total: f64 = totals.iter().map(|e| e.amount).sum();
    table.add_row(vec![
        Cell::new("Total".bold()),
        Cell::new(money(total).bold()),
        Cell::new(""),
    ]);
    println!("Monthly spending\n{table}");
    Ok(())
}

pub async fn trend(category: &str, to_month: Option<String>, months: u32) -> Result<()> {
    let settings = load_settings();
    let Some(credential) = credential_or_notice(&settings) else {
        return Ok(());
    };

    let periods = month_window(None, to_month.as_deref(), months)?;
    let filters = ActivityFilters {
        category: Some(category.to_string()),
        ..window_filters(&periods)
    };
    let records = load_records(&settings, &credential, &filters).await?;
    let summaries = reports::summarize_periods(&records, &periods);
    let trend = reports::category_trend(&summaries, category);

    let mut table = Table::new();
    table.set_header(vec!["Month", "Amount"]);
    for point in &trend {
        table.add_row(vec![
            Cell::new(month_label(&point.month)),
            Cell::new(money(point.amount)),
        ]);
    }
    println!("Trend for {category}\n{table}");
    Ok(())
}
