//! Static configuration table

use anyhow::Result;
use calibrator_lib::ConfigurationTable;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{print_json, print_table, OutputFormat};

#[derive(Tabled, Serialize)]
struct ScenarioRow {
    #[tabled(rename = "Language")]
    language: String,
    #[tabled(rename = "Configuration")]
    configuration: String,
    #[tabled(rename = "Expected Hostname")]
    hostname: String,
}

/// List every configuration the calibrator looks for
pub fn list_scenarios(language: Option<&str>, format: OutputFormat) -> Result<()> {
    let table = match language {
        Some(language) => ConfigurationTable::standard().filter_language(language),
        None => ConfigurationTable::standard(),
    };

    let rows: Vec<ScenarioRow> = table
        .languages()
        .flat_map(|(language, configurations)| {
            configurations.iter().map(move |configuration| ScenarioRow {
                language: language.to_string(),
                configuration: configuration.clone(),
                hostname: format!("{}-{}", language, configuration),
            })
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows)?,
        OutputFormat::Table => print_table(&rows),
    }

    Ok(())
}
