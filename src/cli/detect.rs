use colored::Colorize;

use tally::error::Result;
use tally::importer::{self, ALL_LAYOUTS};

pub fn run(file: &str) -> Result<()> {
    let text = std::fs::read_to_string(file)?;
    match importer::detect(file, &text) {
        Some(layout) => println!("Detected: {} ({})", layout.name(), layout.key()),
        None => {
            let keys: Vec<&str> = ALL_LAYOUTS.iter().map(|l| l.key()).collect();
            let message = format!(
                "Could not detect the format. Pass --format ({}).",
                keys.join(", ")
            );
            println!("{}", message.yellow());
        }
    }
    Ok(())
}
