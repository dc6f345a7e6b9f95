//! Output formatting and display utilities
//!
//! Status lines go to stderr so documents written to stdout can be piped.

use colored::Colorize;

use dcmforge::setting::LogicalName;
use dcmforge::ArtifactSummary;

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green().bold(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

/// Print a warning message
pub fn warning(msg: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), msg);
}

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), msg);
}

/// Print a header
pub fn header(msg: &str) {
    println!("\n{}", msg.bold().underline());
}

/// Print a subheader
pub fn subheader(msg: &str) {
    println!("\n{}", msg.bold());
}

/// Print the logical names created by a composite call
pub fn print_logical_names(names: &[LogicalName]) {
    for name in names {
        eprintln!("  {} {}", "+".green(), name.as_str().dimmed());
    }
}

/// Print a document summary
pub fn print_summary(summary: &ArtifactSummary) {
    header(&format!("{} document", summary.flavor));

    match &summary.identity {
        Some(identity) => println!("  {} {}", "Identity:".bold(), identity),
        None => warning("Flavor element carries no complete identity"),
    }

    subheader(&format!("Settings ({})", summary.settings.len()));
    for name in &summary.settings {
        println!("  {}", name);
    }

    subheader(&format!("Rules ({})", summary.rules.len()));
    for id in &summary.rules {
        println!("  {}", id);
    }
    println!();
}

/// Print a JSON report
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<(), serde_json::Error> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
