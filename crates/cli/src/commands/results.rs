//! Commands reading the results CSV

use anyhow::{Context, Result};
use calibrator_lib::report::{filter_language, overhead_table, target_load_stats, OverheadRow};
use calibrator_lib::results::{read_results, ResultRow};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use crate::output::{
    color_delta, format_optional_rps, format_percent, format_rps, print_info, print_json,
    print_table, print_warning, OutputFormat,
};

/// Row for the target load statistics table
#[derive(Tabled)]
struct StatsRow {
    #[tabled(rename = "Language")]
    language: String,
    #[tabled(rename = "Configuration")]
    configuration: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Runs")]
    runs: usize,
    #[tabled(rename = "Mean RPS")]
    mean: String,
    #[tabled(rename = "Min RPS")]
    min: u32,
    #[tabled(rename = "Max RPS")]
    max: u32,
    #[tabled(rename = "Avg CPU")]
    cpu: String,
}

/// Row for the overhead comparison table
#[derive(Tabled)]
struct OverheadTableRow {
    #[tabled(rename = "Language")]
    language: String,
    #[tabled(rename = "Endpoint")]
    endpoint: String,
    #[tabled(rename = "Standard")]
    standard: String,
    #[tabled(rename = "OTel")]
    otel: String,
    #[tabled(rename = "Elastic")]
    elastic: String,
    #[tabled(rename = "OTel vs Std")]
    otel_vs_standard: String,
    #[tabled(rename = "Elastic vs Std")]
    elastic_vs_standard: String,
    #[tabled(rename = "OTel vs Elastic")]
    otel_vs_elastic: String,
}

impl From<&OverheadRow> for OverheadTableRow {
    fn from(row: &OverheadRow) -> Self {
        Self {
            language: row.language.clone(),
            endpoint: row.endpoint.clone().unwrap_or_else(|| "overall".to_string()),
            standard: format_optional_rps(row.standard),
            otel: format_optional_rps(row.otel),
            elastic: format_optional_rps(row.elastic),
            otel_vs_standard: color_delta(row.otel_vs_standard),
            elastic_vs_standard: color_delta(row.elastic_vs_standard),
            otel_vs_elastic: color_delta(row.otel_vs_elastic),
        }
    }
}

#[derive(Serialize)]
struct OverheadReport<'a> {
    per_endpoint: &'a [OverheadRow],
    overall: &'a [OverheadRow],
}

fn load_rows(path: &Path) -> Result<Vec<ResultRow>> {
    read_results(path).with_context(|| format!("failed to read results from {}", path.display()))
}

/// Show target load statistics per scenario
pub fn show_stats(path: &Path, language: Option<&str>, format: OutputFormat) -> Result<()> {
    let rows = load_rows(path)?;
    let stats = target_load_stats(filter_language(&rows, language));

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            if stats.is_empty() {
                print_warning("No calibration results found");
                return Ok(());
            }

            println!("{}", "Target Load Statistics".bold());
            let table_rows: Vec<StatsRow> = stats
                .iter()
                .map(|s| StatsRow {
                    language: s.language.clone(),
                    configuration: s.configuration.clone(),
                    endpoint: s.endpoint.clone(),
                    runs: s.runs,
                    mean: format_rps(s.mean_target_rps),
                    min: s.min_target_rps,
                    max: s.max_target_rps,
                    cpu: format_percent(s.mean_cpu_usage),
                })
                .collect();
            print_table(&table_rows);
            print_info(&format!("{} rows from {}", rows.len(), path.display()));
        }
    }

    Ok(())
}

/// Compare target loads across instrumentation variants
pub fn show_overhead(path: &Path, language: Option<&str>, format: OutputFormat) -> Result<()> {
    let rows = load_rows(path)?;
    let (per_endpoint, overall) = overhead_table(filter_language(&rows, language));

    match format {
        OutputFormat::Json => print_json(&OverheadReport {
            per_endpoint: &per_endpoint,
            overall: &overall,
        })?,
        OutputFormat::Table => {
            if per_endpoint.is_empty() {
                print_warning("No standard, otel or elastic results found");
                return Ok(());
            }

            println!("{}", "Instrumentation Overhead (mean target RPS)".bold());
            let table_rows: Vec<OverheadTableRow> = per_endpoint.iter().map(Into::into).collect();
            print_table(&table_rows);

            println!();
            println!("{}", "Overall".bold());
            let table_rows: Vec<OverheadTableRow> = overall.iter().map(Into::into).collect();
            print_table(&table_rows);
        }
    }

    Ok(())
}
