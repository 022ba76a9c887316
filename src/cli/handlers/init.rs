use std::fs;

use chrono::Utc;

use crate::cli::commands::InitArgs;
use crate::io::config_io::{self, KANLINE_DIR};
use crate::model::config::Settings;
use crate::ops::board_ops;

pub fn cmd_init(args: InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let vault = super::start_dir()?;

    // Check for an enclosing vault and warn
    if let Some(parent) = vault.parent()
        && let Ok(outer) = config_io::discover_vault(parent)
    {
        eprintln!("note: enclosing vault found at {}/", outer.display());
        eprintln!("creating a separate vault in ./{}/", KANLINE_DIR);
    }

    // Validate imported settings before anything is written
    let mut settings = match &args.import {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("could not read {}: {}", path, e))?;
            config_io::import_plugin_data(&text)?
        }
        None => Settings::default(),
    };

    config_io::init_vault(&vault, args.force)?;

    if let Some(name) = &args.board {
        let id = board_ops::create_board(&mut settings, name, None, &[], Utc::now())?;
        if settings.default_board.is_none() {
            settings.default_board = Some(id);
        }
    }
    config_io::save_settings(&vault, &settings)?;

    println!("initialized kanline vault in {}", vault.join(KANLINE_DIR).display());
    if !settings.boards.is_empty() {
        println!("{} board(s) configured", settings.boards.len());
    }
    Ok(())
}
