use anyhow::Result;
use ar_report_browser::RuntimeProbe;
use ar_report_core::Artifact;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use serde_json::json;

use crate::cli::OutputFormat;

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_artifact(artifact: &Artifact, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(&json!({ "status": "saved", "artifact": artifact }));
    }

    println!(
        "{} {} ({} bytes)",
        "Saved".green().bold(),
        artifact.path.display(),
        artifact.size
    );
    if !artifact.renamed {
        println!(
            "  {} no date found in {:?}, kept the portal's name",
            "note:".yellow(),
            artifact.original_name
        );
    }
    Ok(())
}

pub fn print_probe(probe: &RuntimeProbe, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        return print_json(probe);
    }

    println!(
        "node        {} {}",
        availability(probe.node_available),
        probe.node_version.as_deref().unwrap_or("")
    );
    println!(
        "playwright  {}",
        availability(probe.playwright_package_available)
    );
    println!("chromium    {}", availability(probe.chromium_cache_detected));
    for note in &probe.notes {
        println!("  {} {note}", "note:".yellow());
    }
    Ok(())
}

fn availability(ok: bool) -> ColoredString {
    if ok { "ok".green() } else { "missing".red() }
}
