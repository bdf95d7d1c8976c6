//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table of rows
pub fn print_table<T: Tabled>(items: &[T]) {
    if items.is_empty() {
        println!("{}", "No items found".yellow());
        return;
    }
    let table = Table::new(items).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a request rate
pub fn format_rps(rps: f64) -> String {
    format!("{:.0}", rps)
}

/// Format an optional request rate, `-` when missing
pub fn format_optional_rps(rps: Option<f64>) -> String {
    rps.map(format_rps).unwrap_or_else(|| "-".to_string())
}

/// Format a CPU percentage
pub fn format_percent(percent: f64) -> String {
    format!("{:.1}%", percent)
}

/// Color a relative throughput difference
///
/// Losses are red, gains green; missing values render as `-`.
pub fn color_delta(delta: Option<f64>) -> String {
    match delta {
        None => "-".dimmed().to_string(),
        Some(delta) => {
            let formatted = format!("{:+.1}%", delta);
            if delta <= -10.0 {
                formatted.red().to_string()
            } else if delta < 0.0 {
                formatted.yellow().to_string()
            } else {
                formatted.green().to_string()
            }
        }
    }
}
