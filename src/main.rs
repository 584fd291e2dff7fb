//! photosync - content-addressed media library sync.
//!
//! Entry point for the photosync CLI application.

use clap::Parser;
use photosync::{cli::Cli, error::ExitCode};

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    // The log file may come from the config file, so peek at it first
    let log_file = photosync::load_config(&cli)
        .ok()
        .and_then(|config| config.log_file);
    if let Err(e) = photosync::logging::init_logging(cli.verbose, cli.quiet, log_file.as_deref()) {
        eprintln!("[{}] Error: {}", ExitCode::GeneralError.code_prefix(), e);
        return ExitCode::GeneralError.into();
    }

    match photosync::run_app(cli) {
        Ok(code) => code.into(),
        Err(err) => {
            eprintln!("[{}] Error: {:#}", ExitCode::GeneralError.code_prefix(), err);
            ExitCode::GeneralError.into()
        }
    }
}
