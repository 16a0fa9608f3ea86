mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::activities::ListArgs;
use cli::{Cli, Commands, MappingsCommands, ReportCommands};
use tally::models::ActivityPatch;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, user } => cli::init::run(data_dir, user),
        Commands::Detect { file } => cli::detect::run(&file),
        Commands::Preview { file, format } => cli::import::preview(&file, format.as_deref()).await,
        Commands::Import {
            file,
            format,
            force,
        } => cli::import::run(&file, format.as_deref(), force).await,
        Commands::Uploads => cli::import::uploads().await,
        Commands::List {
            category,
            from_date,
            to_date,
            search,
            related_to,
            limit,
        } => {
            cli::activities::list(ListArgs {
                category,
                from_date,
                to_date,
                search,
                related_to,
                limit,
            })
            .await
        }
        Commands::Edit {
            id,
            date,
            category,
            description,
            amount,
        } => match date.as_deref().map(cli::parse_day).transpose() {
            Ok(date) => {
                let patch = ActivityPatch {
                    date,
                    category,
                    description,
                    amount,
                    ..Default::default()
                };
                cli::activities::edit(&id, patch).await
            }
            Err(e) => Err(e),
        },
        Commands::Delete { id, limit } => cli::activities::delete(&id, limit).await,
        Commands::Mappings { command } => match command {
            MappingsCommands::Add {
                pattern,
                category,
                match_type,
            } => cli::mappings::add(&pattern, &category, &match_type),
            MappingsCommands::List => cli::mappings::list(),
        },
        Commands::Report { command } => match command {
            ReportCommands::Categories { month, top, all } => {
                cli::report::categories(month, top, all).await
            }
            ReportCommands::Monthly {
                from_month,
                to_month,
                months,
            } => cli::report::monthly(from_month, to_month, months).await,
            ReportCommands::Trend {
                category,
                to_month,
                months,
            } => cli::report::trend(&category, to_month, months).await,
        },
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
