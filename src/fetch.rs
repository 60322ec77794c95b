use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::record::{Record, Value};

/// Errors a record source can report. They are shown to the user and never
/// handed to a [`crate::listview::ListView`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("temporarily unavailable: {0}")]
    Transient(String),
    #[error("{0}")]
    Unknown(String),
}

impl FetchError {
    fn from_io(path: &Path, err: std::io::Error) -> Self {
        let location = path.display().to_string();
        match err.kind() {
            ErrorKind::NotFound => FetchError::NotFound(location),
            ErrorKind::PermissionDenied => FetchError::PermissionDenied(location),
            ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                FetchError::Transient(format!("{location}: {err}"))
            }
            _ => FetchError::Unknown(format!("{location}: {err}")),
        }
    }
}

impl From<PolarsError> for FetchError {
    fn from(err: PolarsError) -> Self {
        FetchError::Unknown(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Unknown(format!("invalid json: {err}"))
    }
}

/// A fully materialized result of a fetch.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
    /// Dotted field paths in display order.
    pub columns: Vec<String>,
    pub records: Vec<Record>,
}

impl RecordSet {
    /// Derives the columns from the leaf paths of all records, first seen first.
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for record in records.iter() {
            for path in record.leaf_paths() {
                if seen.insert(path.clone()) {
                    columns.push(path);
                }
            }
        }
        RecordSet { columns, records }
    }
}

pub trait RecordSource: Send + Sync {
    fn name(&self) -> String;
    fn fetch(&self) -> Result<RecordSet, FetchError>;
}

#[derive(Debug)]
enum FileType {
    JSON,
    CSV,
    PARQUET,
    ARROW,
}

/// Loads records from a local json, csv, parquet or arrow file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn detect_file_type(path: &Path) -> Result<FileType, FetchError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("JSON") => Ok(FileType::JSON),
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(FetchError::Unknown(format!(
                "unknown file type: {}",
                path.display()
            ))),
        }
    }

    fn load_json(path: &Path) -> Result<RecordSet, FetchError> {
        let file = File::open(path).map_err(|e| FetchError::from_io(path, e))?;
        let records: Vec<Record> = serde_json::from_reader(BufReader::new(file))?;
        Ok(RecordSet::from_records(records))
    }

    fn load_frame(frame: LazyFrame) -> Result<RecordSet, FetchError> {
        let df = Arc::new(frame.collect()?);

        // Each column is converted in its own rayon task.
        let c_: Result<Vec<(String, Vec<Value>)>, _> = df
            .get_column_names()
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let columns = c_?;

        let records = (0..df.height())
            .map(|row| {
                let mut record = Record::new();
                for (name, values) in columns.iter() {
                    record.insert_path(name, values[row].clone());
                }
                record
            })
            .collect();

        Ok(RecordSet {
            columns: columns.into_iter().map(|(name, _)| name).collect(),
            records,
        })
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
        let column = df.column(col_name)?;
        let numeric = Self::is_numeric_type(column.dtype());

        let col = column.cast(&DataType::String)?;
        let series = col.str()?;
        let values = series
            .into_iter()
            .map(|value| match value {
                None => Value::Null,
                Some(s) if numeric => s
                    .parse::<f64>()
                    .map(Value::Number)
                    .unwrap_or_else(|_| Value::Text(s.to_string())),
                Some(s) => Value::Text(s.to_string()),
            })
            .collect();

        Ok((col_name.to_string(), values))
    }

    fn is_numeric_type(dtype: &DataType) -> bool {
        matches!(
            dtype,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
        )
    }

    fn load_csv(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.as_path().into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(
            PlPath::Local(path.as_path().into()),
            ScanArgsParquet::default(),
        )
    }

    fn load_arrow(path: &PathBuf) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.as_path().into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

impl RecordSource for FileSource {
    fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    fn fetch(&self) -> Result<RecordSet, FetchError> {
        let metadata = fs::metadata(&self.path).map_err(|e| FetchError::from_io(&self.path, e))?;
        if !metadata.is_file() {
            return Err(FetchError::Unknown(format!(
                "not a file: {}",
                self.path.display()
            )));
        }

        let set = match Self::detect_file_type(&self.path)? {
            FileType::JSON => Self::load_json(&self.path)?,
            FileType::CSV => Self::load_frame(Self::load_csv(&self.path)?)?,
            FileType::PARQUET => Self::load_frame(Self::load_parquet(&self.path)?)?,
            FileType::ARROW => Self::load_frame(Self::load_arrow(&self.path)?)?,
        };
        info!(
            "Loaded {} records with {} columns from {} ({} bytes)",
            set.records.len(),
            set.columns.len(),
            self.path.display(),
            metadata.len()
        );
        Ok(set)
    }
}

#[derive(Debug)]
pub struct FetchOutcome {
    pub generation: u64,
    pub source: String,
    pub result: Result<RecordSet, FetchError>,
    pub duration: Duration,
}

/// Runs fetches on a background thread and hands back only the outcome of
/// the most recent request. Outcomes of superseded requests are dropped.
pub struct Fetcher {
    generation: u64,
    pending: bool,
    sender: Sender<FetchOutcome>,
    receiver: Receiver<FetchOutcome>,
}

impl Fetcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            generation: 0,
            pending: false,
            sender,
            receiver,
        }
    }

    /// Starts a fetch and returns its generation. Any fetch still in flight
    /// becomes stale.
    pub fn request(&mut self, source: Arc<dyn RecordSource>) -> u64 {
        self.generation += 1;
        if self.pending {
            debug!("Fetch {} supersedes a pending fetch", self.generation);
        }
        self.pending = true;

        let generation = self.generation;
        let sender = self.sender.clone();
        thread::spawn(move || {
            let start_time = Instant::now();
            let result = source.fetch();
            let outcome = FetchOutcome {
                generation,
                source: source.name(),
                result,
                duration: start_time.elapsed(),
            };
            if sender.send(outcome).is_err() {
                warn!("Fetch {generation} finished after the fetcher was dropped");
            }
        });
        generation
    }

    /// Returns the outcome of the latest request if it has arrived.
    pub fn poll(&mut self) -> Option<FetchOutcome> {
        let mut latest = None;
        while let Ok(outcome) = self.receiver.try_recv() {
            if let Some(current) = self.accept(outcome) {
                latest = Some(current);
            }
        }
        latest
    }

    /// Blocks up to `timeout` for the outcome of the latest request.
    pub fn wait(&mut self, timeout: Duration) -> Option<FetchOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let outcome = self.receiver.recv_timeout(remaining).ok()?;
            if let Some(current) = self.accept(outcome) {
                return Some(current);
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        self.pending
    }

    fn accept(&mut self, outcome: FetchOutcome) -> Option<FetchOutcome> {
        if outcome.generation == self.generation {
            self.pending = false;
            Some(outcome)
        } else {
            debug!(
                "Dropping stale fetch {} (current {})",
                outcome.generation, self.generation
            );
            None
        }
    }
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_file_types() {
        assert!(matches!(
            FileSource::detect_file_type(Path::new("a.JSON")),
            Ok(FileType::JSON)
        ));
        assert!(matches!(
            FileSource::detect_file_type(Path::new("a.pq")),
            Ok(FileType::PARQUET)
        ));
        assert!(matches!(
            FileSource::detect_file_type(Path::new("a.feather")),
            Ok(FileType::ARROW)
        ));
        assert!(matches!(
            FileSource::detect_file_type(Path::new("a.xlsx")),
            Err(FetchError::Unknown(_))
        ));
    }

    #[test]
    fn maps_io_error_kinds() {
        let p = Path::new("x.json");
        assert_eq!(
            FetchError::from_io(p, ErrorKind::NotFound.into()),
            FetchError::NotFound("x.json".into())
        );
        assert!(matches!(
            FetchError::from_io(p, ErrorKind::PermissionDenied.into()),
            FetchError::PermissionDenied(_)
        ));
        assert!(matches!(
            FetchError::from_io(p, ErrorKind::TimedOut.into()),
            FetchError::Transient(_)
        ));
        assert!(matches!(
            FetchError::from_io(p, ErrorKind::InvalidData.into()),
            FetchError::Unknown(_)
        ));
    }

    #[test]
    fn columns_follow_first_appearance() {
        let set = RecordSet::from_records(vec![
            Record::new().with("Name", "a"),
            Record::new()
                .with("Name", "b")
                .with("By", Record::new().with("Name", "c")),
        ]);
        assert_eq!(set.columns, vec!["Name", "By.Name"]);
    }
}
