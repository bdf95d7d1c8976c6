//! Result emission
//!
//! Two outputs per run: an append-only CSV with one row per calibrated
//! scenario, and a free-text progress log written line by line as events
//! happen.

use crate::error::{CalibrationError, Result};
use crate::models::ScenarioRecord;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

/// Header line of every progress log
pub const PROGRESS_LOG_HEADER: &str = "RPS, CPU Usage (%)";

/// Results file shared by every run
pub const SHARED_RESULTS_FILE: &str = "rps_calibration_results.csv";

/// Local-time stamp used in per-run file names
pub fn run_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Per-run file names for a run started at `timestamp`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFiles {
    pub results: PathBuf,
    pub shared_results: PathBuf,
    pub progress_log: PathBuf,
    pub metrics: PathBuf,
}

impl RunFiles {
    pub fn new(dir: impl AsRef<Path>, timestamp: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            results: dir.join(format!("rps_calibration_results_{}.csv", timestamp)),
            shared_results: dir.join(SHARED_RESULTS_FILE),
            progress_log: dir.join(format!("cpu_utilization_log_{}.txt", timestamp)),
            metrics: dir.join("metrics.prom"),
        }
    }
}

/// Column layout written by [`CsvResultsFile`], in order
pub const RESULT_COLUMNS: &[&str] = &[
    "run_id",
    "language",
    "configuration",
    "endpoint",
    "container_id",
    "host",
    "port",
    "reached_target",
    "targetRPS",
    "final_load",
    "avgCPUUsage",
];

/// One row of the results CSV
///
/// Column names match the files produced by earlier calibration runs, so the
/// report tooling can read both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    #[serde(default)]
    pub run_id: String,
    pub language: String,
    pub configuration: String,
    pub endpoint: String,
    #[serde(default)]
    pub container_id: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub reached_target: Option<bool>,
    #[serde(rename = "targetRPS")]
    pub target_rps: u32,
    #[serde(default)]
    pub final_load: Option<u32>,
    #[serde(rename = "avgCPUUsage", default)]
    pub avg_cpu_usage: f64,
}

impl From<&ScenarioRecord> for ResultRow {
    fn from(record: &ScenarioRecord) -> Self {
        Self {
            run_id: record.run_id.clone(),
            language: record.scenario.language.clone(),
            configuration: record.scenario.configuration.clone(),
            endpoint: record.scenario.endpoint.clone(),
            container_id: record.scenario.container_id.clone(),
            host: record.scenario.host.clone(),
            port: Some(record.scenario.port),
            reached_target: Some(record.result.reached_target),
            target_rps: record.result.target_load(),
            final_load: Some(record.result.final_load),
            avg_cpu_usage: record.result.avg_cpu_usage,
        }
    }
}

/// Destination for calibrated scenarios
pub trait RecordSink: Send {
    fn append(&mut self, record: &ScenarioRecord) -> Result<()>;
}

/// A single append-only CSV results file
pub struct CsvResultsFile {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl CsvResultsFile {
    /// Open for appending; the header is written only if the file is new or empty
    ///
    /// A non-empty file must already carry [`RESULT_COLUMNS`] as its header,
    /// otherwise appended rows would not line up with it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let needs_header = match std::fs::metadata(&path) {
            Ok(metadata) => metadata.len() == 0,
            Err(_) => true,
        };
        if !needs_header {
            check_layout(&path)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        debug!(path = %path.display(), header = needs_header, "Opened results file");
        Ok(Self { path, writer })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn check_layout(path: &Path) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    let mut header = csv::StringRecord::new();
    reader.read_record(&mut header)?;

    if header.iter().eq(RESULT_COLUMNS.iter().copied()) {
        return Ok(());
    }
    Err(CalibrationError::ResultsLayout {
        path: path.to_path_buf(),
        found: header.iter().map(str::to_string).collect(),
        expected: RESULT_COLUMNS.iter().map(|c| c.to_string()).collect(),
    })
}

impl RecordSink for CsvResultsFile {
    fn append(&mut self, record: &ScenarioRecord) -> Result<()> {
        self.writer.serialize(ResultRow::from(record))?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Fans each record out to several CSV files
pub struct ResultsSink {
    files: Vec<CsvResultsFile>,
}

impl ResultsSink {
    pub fn open<I, P>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let files = paths
            .into_iter()
            .map(CsvResultsFile::open)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { files })
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(CsvResultsFile::path).collect()
    }
}

impl RecordSink for ResultsSink {
    fn append(&mut self, record: &ScenarioRecord) -> Result<()> {
        for file in &mut self.files {
            file.append(record)?;
        }
        info!(
            host = %record.scenario.host,
            endpoint = %record.scenario.endpoint,
            target_load = record.result.target_load(),
            "Appended calibration result"
        );
        Ok(())
    }
}

/// Read every row of a results CSV
pub fn read_results(path: impl AsRef<Path>) -> Result<Vec<ResultRow>> {
    let mut reader = csv::Reader::from_path(path)?;
    let rows = reader
        .deserialize::<ResultRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Human-readable progress log
pub struct ProgressLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl ProgressLog {
    /// Create (or truncate) the log and write its header line
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::create(&path)?;
        writeln!(file, "{}", PROGRESS_LOG_HEADER)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line and flush it to disk
    pub fn line(&self, message: impl Display) -> Result<()> {
        let mut file = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(file, "{}", message)?;
        file.flush()?;
        Ok(())
    }
}
