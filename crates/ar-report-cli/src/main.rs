mod cli;
mod commands;
mod completions;
mod config;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use cli::{Cli, Commands};
use error::handle_error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        completions::write_completions(shell, &mut std::io::stdout());
        return ExitCode::SUCCESS;
    }

    let _guard = match logging::init(cli.verbose, cli.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(err) => handle_error(err),
    };

    let settings = config::Settings::load(cli.config.as_deref());
    let format = cli.format;

    let result = match cli.command {
        None => Ok(commands::run::execute(cli.run, &settings, format).await),
        Some(Commands::Run(args)) => Ok(commands::run::execute(args, &settings, format).await),
        Some(Commands::Probe(args)) => commands::probe::execute(args, format).await,
        Some(Commands::Rename { filename }) => {
            commands::rename::execute(&filename, format).map(|()| ExitCode::SUCCESS)
        }
        Some(Commands::Completions { .. }) => Ok(ExitCode::SUCCESS),
    };

    result.unwrap_or_else(|err| handle_error(err))
}
