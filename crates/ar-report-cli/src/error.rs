use ar_report_core::ReportError;
use colored::Colorize;
use serde_json::json;

use crate::cli::OutputFormat;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);
    std::process::exit(1);
}

/// Prints a failed run on the console, with a hint where one helps.
pub fn report_failure(err: &ReportError, format: OutputFormat) {
    if format.is_json() {
        let body = json!({
            "status": "failed",
            "kind": err.kind(),
            "error": err.to_string(),
        });
        println!("{body:#}");
    }

    eprintln!("{} {}", "Error:".red().bold(), err);

    let suggestion: &[&str] = match err.kind() {
        "config" if err.to_string().contains("missing credentials") => &[
            "Set the portal credentials with:",
            "  AR_LOGIN=<login> AR_PASSWORD=<password> ar-report",
        ],
        "launch" => &[
            "Install the browser runtime with:",
            "  npm i playwright && npx playwright install chromium",
        ],
        "navigation_timeout" => &[
            "The portal did not populate the form in time.",
            "  Raise timeouts.readiness_ms in the config file if it is just slow.",
        ],
        "report_timeout" => &[
            "The report did not render. It may have no data for yesterday,",
            "  or the portal is slow; timeouts.report_ms allows up to 60000.",
        ],
        "download_timeout" => &["Raise timeouts.download_ms if the export is large."],
        _ => &[],
    };

    if !suggestion.is_empty() {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        for line in suggestion {
            eprintln!("  {line}");
        }
    }
}
