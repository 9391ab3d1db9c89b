use std::process::ExitCode;

use clap::Parser;
use easybackup_lib::cli::{Action, Cli};
use easybackup_lib::clock;
use easybackup_lib::config::{Composition, Registry};
use easybackup_lib::event::{LogObserver, Observers};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init logger
    let mut env_logger = env_logger::builder();
    if let Some(level) = cli.verbose {
        env_logger.filter_level(level);
    }
    env_logger.try_init().expect("env_logger should not fail");

    let observers = Observers::new().with(LogObserver);
    let composition = match Composition::load_file(
        &cli.config,
        &Registry::default(),
        clock::system(),
        observers,
    ) {
        Ok(composition) => composition,
        Err(e) => {
            log::error!(target: "config", "Loading {} failed: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    match cli.action.unwrap_or_default() {
        Action::Run => run(&composition, cli.keep_going),
        Action::List { json } => list(&composition, json),
        Action::Check => {
            println!(
                "{} is valid: {} repositories, {} volumes",
                cli.config.display(),
                composition.repositories().len(),
                composition.supervisors().len()
            );
            ExitCode::SUCCESS
        }
    }
}

fn run(composition: &Composition, keep_going: bool) -> ExitCode {
    let mut failed = 0;

    for supervisor in composition.supervisors() {
        match supervisor.run() {
            Ok(report) => {
                let created = report
                    .created
                    .map_or_else(|| "no backup due".to_string(), |b| format!("created {b}"));
                log::info!(target: "supervisor", "{supervisor}: cleaned up {}, {created}", report.cleaned.len());
            }
            Err(e) => {
                log::error!(target: "supervisor", "Run of {supervisor} resulted in a fatal error: {e}");
                failed += 1;
                if !keep_going {
                    return ExitCode::FAILURE;
                }
            }
        }
    }

    if failed > 0 {
        log::error!(target: "supervisor", "{failed} of {} runs failed", composition.supervisors().len());
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn list(composition: &Composition, json: bool) -> ExitCode {
    let mut volumes = Vec::new();

    for supervisor in composition.supervisors() {
        let backups = match supervisor.fetch() {
            Ok(backups) => backups,
            Err(e) => {
                log::error!(target: "repository", "Listing backups of {supervisor} failed: {e}");
                return ExitCode::FAILURE;
            }
        };

        if json {
            volumes.push(serde_json::json!({
                "project": supervisor.project(),
                "volume": supervisor.volume(),
                "repository": supervisor.repository().to_string(),
                "backups": backups,
            }));
        } else {
            println!(
                "{}/{} in {}:",
                supervisor.project(),
                supervisor.volume(),
                supervisor.repository()
            );
            for backup in &backups {
                println!("  {backup}");
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&volumes) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                log::error!("Serializing the backup list failed: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
