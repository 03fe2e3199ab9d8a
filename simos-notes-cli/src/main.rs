use crate::cli::CliConfig;
use clap::Parser;
use simos_notes_core::{load_settings, load_settings_from, Notepad};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;
mod commands;
mod logging;

fn main() -> ExitCode {
    logging::init_logging();

    let cli_config = CliConfig::parse();

    let mut settings = match &cli_config.settings {
        Some(path) => load_settings_from(path),
        None => load_settings(),
    };
    if let Some(dir) = &cli_config.data_dir {
        settings.data_directory = dir.to_string_lossy().into_owned();
    }

    let mut notepad = match Notepad::open(&settings) {
        Ok(notepad) => notepad,
        Err(e) => {
            eprintln!("simos-notes: could not open notes: {e}");
            return ExitCode::FAILURE;
        }
    };

    let export_dir = PathBuf::from(&settings.export_directory);
    let result = commands::run(
        &mut notepad,
        cli_config.command,
        &export_dir,
        &mut io::stdin().lock(),
        &mut io::stdout().lock(),
    );

    for message in notepad.take_notifications() {
        eprintln!("simos-notes: {message}");
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("command failed: {e:?}");
            eprintln!("simos-notes: {}", e.user_message());
            ExitCode::FAILURE
        }
    }
}
