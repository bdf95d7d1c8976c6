//! Aggregations over calibration result files

use crate::results::ResultRow;
use serde::Serialize;
use std::collections::BTreeMap;

/// Target load statistics for one (language, configuration, endpoint)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetLoadStats {
    pub language: String,
    pub configuration: String,
    pub endpoint: String,
    pub runs: usize,
    pub mean_target_rps: f64,
    pub min_target_rps: u32,
    pub max_target_rps: u32,
    pub mean_cpu_usage: f64,
}

/// Instrumentation variants compared by the overhead table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Variant {
    Standard,
    Otel,
    Elastic,
}

impl Variant {
    /// Variant named by the configuration suffix after the last `-`
    pub fn of(configuration: &str) -> Option<Self> {
        let suffix = configuration.rsplit('-').next().unwrap_or(configuration);
        match suffix {
            "standard" => Some(Self::Standard),
            "otel" => Some(Self::Otel),
            "elastic" => Some(Self::Elastic),
            _ => None,
        }
    }
}

/// Mean target load per variant and the relative differences between them
///
/// `endpoint` is `None` for the per-language overall row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverheadRow {
    pub language: String,
    pub endpoint: Option<String>,
    pub standard: Option<f64>,
    pub otel: Option<f64>,
    pub elastic: Option<f64>,
    pub otel_vs_standard: Option<f64>,
    pub elastic_vs_standard: Option<f64>,
    pub otel_vs_elastic: Option<f64>,
}

impl OverheadRow {
    fn new(language: &str, endpoint: Option<&str>, means: &BTreeMap<Variant, f64>) -> Self {
        let standard = means.get(&Variant::Standard).copied();
        let otel = means.get(&Variant::Otel).copied();
        let elastic = means.get(&Variant::Elastic).copied();
        Self {
            language: language.to_string(),
            endpoint: endpoint.map(str::to_string),
            standard,
            otel,
            elastic,
            otel_vs_standard: relative_difference(otel, standard),
            elastic_vs_standard: relative_difference(elastic, standard),
            otel_vs_elastic: relative_difference(otel, elastic),
        }
    }
}

/// `(value - baseline) / baseline` in percent
pub fn relative_difference(value: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    match (value, baseline) {
        (Some(value), Some(baseline)) if baseline != 0.0 => {
            Some((value - baseline) / baseline * 100.0)
        }
        _ => None,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Keep rows for one language, or all rows when `language` is `None`
pub fn filter_language<'a>(rows: &'a [ResultRow], language: Option<&str>) -> Vec<&'a ResultRow> {
    rows.iter()
        .filter(|row| language.map_or(true, |l| row.language == l))
        .collect()
}

/// Group rows by (language, configuration, endpoint)
pub fn target_load_stats<'a, I>(rows: I) -> Vec<TargetLoadStats>
where
    I: IntoIterator<Item = &'a ResultRow>,
{
    let mut groups: BTreeMap<(&str, &str, &str), Vec<&ResultRow>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.language.as_str(), row.configuration.as_str(), row.endpoint.as_str()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|((language, configuration, endpoint), rows)| {
            let loads: Vec<f64> = rows.iter().map(|r| r.target_rps as f64).collect();
            let cpu: Vec<f64> = rows.iter().map(|r| r.avg_cpu_usage).collect();
            TargetLoadStats {
                language: language.to_string(),
                configuration: configuration.to_string(),
                endpoint: endpoint.to_string(),
                runs: rows.len(),
                mean_target_rps: mean(&loads),
                min_target_rps: rows.iter().map(|r| r.target_rps).min().unwrap_or(0),
                max_target_rps: rows.iter().map(|r| r.target_rps).max().unwrap_or(0),
                mean_cpu_usage: mean(&cpu),
            }
        })
        .collect()
}

/// Compare instrumentation variants per (language, endpoint)
///
/// Returns the per-endpoint rows and one overall row per language, where
/// each variant's overall value is the mean of its per-endpoint means.
/// Rows whose configuration is not a known variant are ignored.
pub fn overhead_table<'a, I>(rows: I) -> (Vec<OverheadRow>, Vec<OverheadRow>)
where
    I: IntoIterator<Item = &'a ResultRow>,
{
    let mut loads: BTreeMap<(&str, &str), BTreeMap<Variant, Vec<f64>>> = BTreeMap::new();
    for row in rows {
        let Some(variant) = Variant::of(&row.configuration) else {
            continue;
        };
        loads
            .entry((row.language.as_str(), row.endpoint.as_str()))
            .or_default()
            .entry(variant)
            .or_default()
            .push(row.target_rps as f64);
    }

    let mut per_endpoint = Vec::new();
    let mut endpoint_means: BTreeMap<&str, BTreeMap<Variant, Vec<f64>>> = BTreeMap::new();
    for ((language, endpoint), variants) in loads {
        let means: BTreeMap<Variant, f64> = variants
            .iter()
            .map(|(variant, values)| (*variant, mean(values)))
            .collect();

        let language_means = endpoint_means.entry(language).or_default();
        for (variant, value) in &means {
            language_means.entry(*variant).or_default().push(*value);
        }
        per_endpoint.push(OverheadRow::new(language, Some(endpoint), &means));
    }

    let overall = endpoint_means
        .into_iter()
        .map(|(language, variants)| {
            let means: BTreeMap<Variant, f64> = variants
                .iter()
                .map(|(variant, values)| (*variant, mean(values)))
                .collect();
            OverheadRow::new(language, None, &means)
        })
        .collect();

    (per_endpoint, overall)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(
        language: &str,
        configuration: &str,
        endpoint: &str,
        target_rps: u32,
        cpu: f64,
    ) -> ResultRow {
        ResultRow {
            run_id: String::new(),
            language: language.to_string(),
            configuration: configuration.to_string(),
            endpoint: endpoint.to_string(),
            container_id: String::new(),
            host: format!("{}-{}", language, configuration),
            port: None,
            reached_target: None,
            target_rps,
            final_load: None,
            avg_cpu_usage: cpu,
        }
    }

    #[test]
    fn test_variant_of_configuration() {
        assert_eq!(Variant::of("flask-otel"), Some(Variant::Otel));
        assert_eq!(Variant::of("spring-elastic"), Some(Variant::Elastic));
        assert_eq!(Variant::of("standard"), Some(Variant::Standard));
        assert_eq!(Variant::of("flask-datadog"), None);
    }

    #[test]
    fn test_relative_difference() {
        assert_eq!(relative_difference(Some(900.0), Some(1000.0)), Some(-10.0));
        assert_eq!(relative_difference(Some(900.0), None), None);
        assert_eq!(relative_difference(Some(900.0), Some(0.0)), None);
    }

    #[test]
    fn test_target_load_stats_groups_runs() {
        let rows = vec![
            row("go", "otel", "json", 1800, 76.0),
            row("go", "otel", "json", 2200, 80.0),
            row("go", "otel", "db", 600, 78.0),
            row("go", "standard", "json", 2400, 77.0),
        ];

        let stats = target_load_stats(&rows);

        assert_eq!(stats.len(), 3);
        let json = stats
            .iter()
            .find(|s| s.configuration == "otel" && s.endpoint == "json")
            .unwrap();
        assert_eq!(json.runs, 2);
        assert_eq!(json.mean_target_rps, 2000.0);
        assert_eq!(json.min_target_rps, 1800);
        assert_eq!(json.max_target_rps, 2200);
        assert_eq!(json.mean_cpu_usage, 78.0);
    }

    #[test]
    fn test_filter_language() {
        let rows = vec![
            row("go", "otel", "json", 1800, 76.0),
            row("python", "flask-otel", "json", 400, 79.0),
        ];

        assert_eq!(filter_language(&rows, Some("python")).len(), 1);
        assert_eq!(filter_language(&rows, None).len(), 2);
    }

    #[test]
    fn test_overhead_table() {
        let rows = vec![
            row("python", "flask-standard", "json", 1000, 76.0),
            row("python", "flask-otel", "json", 800, 77.0),
            row("python", "flask-elastic", "json", 900, 78.0),
            row("python", "flask-standard", "db", 400, 76.0),
            row("python", "flask-otel", "db", 300, 79.0),
            row("python", "flask-datadog", "db", 100, 79.0),
        ];

        let (per_endpoint, overall) = overhead_table(&rows);

        assert_eq!(per_endpoint.len(), 2);
        let json = per_endpoint
            .iter()
            .find(|r| r.endpoint.as_deref() == Some("json"))
            .unwrap();
        assert_eq!(json.otel_vs_standard, Some(-20.0));
        assert_eq!(json.elastic_vs_standard, Some(-10.0));

        let db = per_endpoint
            .iter()
            .find(|r| r.endpoint.as_deref() == Some("db"))
            .unwrap();
        assert_eq!(db.elastic, None);
        assert_eq!(db.otel_vs_elastic, None);
        assert_eq!(db.otel_vs_standard, Some(-25.0));

        assert_eq!(overall.len(), 1);
        assert_eq!(overall[0].endpoint, None);
        assert_eq!(overall[0].standard, Some(700.0));
        assert_eq!(overall[0].otel, Some(550.0));
        assert_eq!(overall[0].elastic, Some(900.0));
    }
}
