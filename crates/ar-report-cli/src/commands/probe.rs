use std::process::ExitCode;

use ar_report_browser::probe_runtime;

use crate::cli::{OutputFormat, ProbeArgs};
use crate::output::print_probe;

pub async fn execute(args: ProbeArgs, format: OutputFormat) -> anyhow::Result<ExitCode> {
    let probe = probe_runtime(args.runtime.playwright_dir.as_deref()).await;
    print_probe(&probe, format)?;

    Ok(if probe.ready {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
