use std::path::PathBuf;

use tally::db::{get_connection, init_db};
use tally::error::Result;
use tally::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, user: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(user) = user {
        settings.user = user.trim().to_string();
    }

    save_settings(&settings)?;

    let resolved = PathBuf::from(&settings.data_dir);
    std::fs::create_dir_all(&resolved)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!("Initialized tally at {}", resolved.display());
    if settings.user.is_empty() {
        println!("No user set; imports are disabled until you run `tally init --user <name>`.");
    } else {
        println!("Signed in as {}", settings.user);
    }
    Ok(())
}
