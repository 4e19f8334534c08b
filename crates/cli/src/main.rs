//! `agents` binary.

use std::process::ExitCode;

use clap::Parser;
use crewroute_cli::{help_text, run_task, team_listing, Cli, Command};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // .env in the current directory first, then in --dir (earlier values win)
    let _ = dotenvy::dotenv();
    if let Some(dir) = &cli.dir {
        let _ = dotenvy::from_path(dir.join(".env"));
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = match cli.command() {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Command::Help => {
            println!("{}", help_text());
            ExitCode::SUCCESS
        }
        Command::List => {
            print!("{}", team_listing());
            ExitCode::SUCCESS
        }
        Command::Run(args) => {
            let mut stdout = std::io::stdout();
            match run_task(&args, |var| std::env::var(var).ok(), &mut stdout).await {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("\nError: {e:?}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
