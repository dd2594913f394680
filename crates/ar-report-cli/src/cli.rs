use ar_report_core::config::{DEFAULT_OUTPUT_DIR, DEFAULT_PORTAL_URL};
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Output format for CLI commands
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn is_json(self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}

#[derive(Parser)]
#[command(name = "ar-report")]
#[command(version, about = "AR Report - daily operations report downloader")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Arguments for the default `run` command
    #[command(flatten)]
    pub run: RunArgs,

    /// Settings file (defaults to <config dir>/ar-report/config.toml)
    #[arg(long, global = true, env = "AR_REPORT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Also write logs to a daily rotated file in this directory
    #[arg(long, global = true, env = "AR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download yesterday's report (default)
    Run(RunArgs),

    /// Check that Node.js and Playwright are available
    Probe(ProbeArgs),

    /// Show the artifact name a downloaded file would get
    Rename {
        /// Filename suggested by the portal
        filename: String,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Portal login
    #[arg(long, env = "AR_LOGIN")]
    pub login: Option<String>,

    /// Portal password
    #[arg(long, env = "AR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory receiving the CSV artifact
    #[arg(long, env = "SAVE_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Run the browser without a window (HEADLESS=0 shows it)
    #[arg(
        long,
        env = "HEADLESS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub headless: bool,

    /// Portal address
    #[arg(long, env = "AR_PORTAL_URL", default_value = DEFAULT_PORTAL_URL)]
    pub portal_url: String,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// Exit with status 0 even when the run fails
    #[arg(
        long,
        env = "AR_EXIT_ZERO",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub exit_zero: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RuntimeArgs {
    /// Directory whose node_modules provides playwright
    #[arg(long, env = "AR_PLAYWRIGHT_DIR")]
    pub playwright_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn headless_accepts_numeric_flag() {
        let cli = Cli::try_parse_from(["ar-report", "run", "--headless", "0"]).unwrap();
        match cli.command {
            Some(Commands::Run(args)) => assert!(!args.headless),
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn bare_invocation_uses_top_level_run_args() {
        let cli = Cli::try_parse_from(["ar-report", "--output-dir", "/tmp/out", "--exit-zero"])
            .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.output_dir, PathBuf::from("/tmp/out"));
        assert!(cli.run.exit_zero);
    }

    #[test]
    fn rename_takes_a_filename() {
        let cli = Cli::try_parse_from(["ar-report", "rename", "Report March 2024 15.csv"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Rename { filename }) if filename == "Report March 2024 15.csv"
        ));
    }
}
