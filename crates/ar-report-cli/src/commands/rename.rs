use ar_report_core::rename;
use serde_json::json;

use crate::cli::OutputFormat;
use crate::output::print_json;

pub fn execute(filename: &str, format: OutputFormat) -> anyhow::Result<()> {
    let renamed = rename(filename);

    if format.is_json() {
        return print_json(&json!({
            "original": filename,
            "file_name": renamed.file_name,
            "renamed": renamed.matched,
            "failure": renamed.failure.as_ref().map(ToString::to_string),
        }));
    }

    println!("{}", renamed.file_name);
    if let Some(failure) = &renamed.failure {
        eprintln!("note: {failure}, name left unchanged");
    }
    Ok(())
}
