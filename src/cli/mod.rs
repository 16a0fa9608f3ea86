pub mod activities;
pub mod detect;
pub mod import;
pub mod init;
pub mod mappings;
pub mod report;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;

use tally::db::SqliteStore;
use tally::error::{Result, TallyError};
use tally::models::Credential;
use tally::settings::Settings;

#[derive(Parser)]
#[command(
    name = "tally",
    about = "Import bank activity exports and break down where the money went."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and user, and initialize the database.
    Init {
        /// Path for tally data (default: ~/.local/share/tally)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// User that imported activities belong to
        #[arg(long)]
        user: Option<String>,
    },
    /// Guess which bank layout a file uses.
    Detect {
        /// Path to a CSV export
        file: String,
    },
    /// Parse a file and show what would be imported.
    Preview {
        file: String,
        /// Layout key: cap1, rbc, td
        #[arg(long)]
        format: Option<String>,
    },
    /// Import a CSV export, applying category mappings.
    Import {
        file: String,
        /// Layout key: cap1, rbc, td
        #[arg(long)]
        format: Option<String>,
        /// Import even if this file was imported before
        #[arg(long)]
        force: bool,
    },
    /// List previously imported files.
    Uploads,
    /// List activities, newest first.
    List {
        #[arg(long)]
        category: Option<String>,
        /// Start date, YYYY-MM-DD (inclusive)
        #[arg(long = "from")]
        from_date: Option<String>,
        /// End date, YYYY-MM-DD (inclusive)
        #[arg(long = "to")]
        to_date: Option<String>,
        /// Case-insensitive description search
        #[arg(long)]
        search: Option<String>,
        /// Show activities that look related to this activity ID
        #[arg(long = "related-to")]
        related_to: Option<String>,
        /// Number of activities to show (default: page size)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Change fields of an activity.
    Edit {
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        amount: Option<f64>,
    },
    /// Delete an activity and show the refreshed list.
    Delete {
        id: String,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Manage description to category mappings.
    Mappings {
        #[command(subcommand)]
        command: MappingsCommands,
    },
    /// Spending reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Subcommand)]
pub enum MappingsCommands {
    /// Add a mapping. Earlier mappings win.
    Add {
        /// Pattern to match against activity descriptions
        pattern: String,
        #[arg(long)]
        category: String,
        /// Match type: contains, starts_with, regex
        #[arg(long = "match-type", default_value = "contains")]
        match_type: String,
    },
    /// List mappings in the order they apply.
    List,
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Spending by category for a month or all time.
    Categories {
        /// Month: YYYY-MM (default: all time)
        #[arg(long)]
        month: Option<String>,
        /// Categories to show before folding the rest into Others
        #[arg(long)]
        top: Option<usize>,
        /// Show every category
        #[arg(long, conflicts_with = "top")]
        all: bool,
    },
    /// Spending per month, newest first.
    Monthly {
        /// First month: YYYY-MM
        #[arg(long = "from")]
        from_month: Option<String>,
        /// Last month: YYYY-MM (default: current month)
        #[arg(long = "to")]
        to_month: Option<String>,
        /// Months to show when --from is not given
        #[arg(long, default_value = "12")]
        months: u32,
    },
    /// One category's spending per month.
    Trend {
        category: String,
        /// Last month: YYYY-MM (default: current month)
        #[arg(long = "to")]
        to_month: Option<String>,
        /// Months to show, ending with --to
        #[arg(long, default_value = "7")]
        months: u32,
    },
}

pub(crate) fn open_store(settings: &Settings) -> Result<SqliteStore> {
    std::fs::create_dir_all(&settings.data_dir)?;
    SqliteStore::open(&settings.db_path())
}

/// The signed-in user's credential, or a notice when there is none.
pub(crate) fn credential_or_notice(settings: &Settings) -> Option<Credential> {
    let credential = settings.credential();
    if credential.is_none() {
        println!("{}", "Not authenticated. Run `tally init --user <name>` first.".yellow());
    }
    credential
}

pub(crate) fn parse_month(month: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{month}-01"), "%Y-%m-%d")
        .map_err(|_| TallyError::InvalidFilter(format!("expected YYYY-MM, got {month}")))
}

pub(crate) fn parse_day(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| TallyError::InvalidFilter(format!("expected YYYY-MM-DD, got {date}")))
}
