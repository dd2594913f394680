use std::process::ExitCode;

use ar_report_browser::PlaywrightLauncher;
use ar_report_core::RunConfig;

use crate::cli::{OutputFormat, RunArgs};
use crate::config::Settings;
use crate::error::report_failure;
use crate::output::print_artifact;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 2;

pub async fn execute(args: RunArgs, settings: &Settings, format: OutputFormat) -> ExitCode {
    let exit_zero = args.exit_zero;
    let mut launcher = PlaywrightLauncher::new();
    if let Some(dir) = &args.runtime.playwright_dir {
        launcher = launcher.with_working_dir(dir);
    }
    let config = build_config(args, settings);

    match ar_report_core::run(&config, &launcher).await {
        Ok(artifact) => {
            if let Err(err) = print_artifact(&artifact, format) {
                tracing::warn!("failed to print result: {err}");
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            report_failure(&err, format);
            if exit_zero {
                ExitCode::SUCCESS
            } else if err.is_config() {
                ExitCode::from(EXIT_CONFIG)
            } else {
                ExitCode::from(EXIT_FAILURE)
            }
        }
    }
}

fn build_config(args: RunArgs, settings: &Settings) -> RunConfig {
    RunConfig {
        login: args.login,
        password: args.password,
        headless: args.headless,
        output_dir: args.output_dir,
        portal_url: args.portal_url,
        timeouts: settings.timeouts,
        ..RunConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::RuntimeArgs;
    use ar_report_core::Timeouts;
    use std::path::PathBuf;

    fn args() -> RunArgs {
        RunArgs {
            login: Some("ops".to_string()),
            password: Some("secret".to_string()),
            output_dir: PathBuf::from("/tmp/reports"),
            headless: false,
            portal_url: "https://portal.test/".to_string(),
            runtime: RuntimeArgs::default(),
            exit_zero: false,
        }
    }

    #[test]
    fn build_config_takes_arguments_and_settings() {
        let settings = Settings {
            timeouts: Timeouts {
                report_ms: 40_000,
                ..Timeouts::default()
            },
        };

        let config = build_config(args(), &settings);

        assert_eq!(config.login.as_deref(), Some("ops"));
        assert_eq!(config.password.as_deref(), Some("secret"));
        assert!(!config.headless);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/reports"));
        assert_eq!(config.portal_url, "https://portal.test/");
        assert_eq!(config.timeouts.report_ms, 40_000);
        assert_eq!(config.report, RunConfig::default().report);
    }
}
