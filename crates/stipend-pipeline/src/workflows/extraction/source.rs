use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upload limit applied when no explicit limit is configured.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

/// Rows exactly as read from the source, before any header matching.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { headers, rows }
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, csv::Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader
            .headers()?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            rows.push(
                record
                    .iter()
                    .map(|cell| Value::String(cell.to_string()))
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }

    /// Builds a table from an array of row objects. Headers are the union of
    /// every row's keys; keys a row lacks become nulls.
    pub fn from_json_rows(rows: Vec<Value>) -> Result<Self, String> {
        let mut objects = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(object) => objects.push(object),
                other => {
                    return Err(format!(
                        "row {index} must be an object, found {}",
                        json_kind(&other)
                    ))
                }
            }
        }

        let mut headers: Vec<String> = Vec::new();
        for object in &objects {
            for key in object.keys() {
                if !headers.iter().any(|header| header == key) {
                    headers.push(key.clone());
                }
            }
        }

        let rows = objects
            .into_iter()
            .map(|mut object| {
                headers
                    .iter()
                    .map(|header| object.remove(header).unwrap_or(Value::Null))
                    .collect()
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Reader capability the pipeline pulls raw rows from.
pub trait RecordSource: Send + Sync {
    fn load(&self, file_id: &str) -> Result<RawTable, SourceError>;
}

/// Reads `.csv` and `.json` roster files from a single directory.
#[derive(Debug, Clone)]
pub struct FileRecordSource {
    base_dir: PathBuf,
    max_bytes: u64,
}

impl FileRecordSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn resolve(&self, file_id: &str) -> Result<(PathBuf, SourceFormat), SourceError> {
        let trimmed = file_id.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed == "."
            || trimmed.contains("..")
        {
            return Err(SourceError::Unsupported {
                file_id: file_id.to_string(),
                reason: "file identifiers must be plain file names".to_string(),
            });
        }

        let extension = Path::new(trimmed)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let format = match extension.as_deref() {
            Some("csv") => SourceFormat::Csv,
            Some("json") => SourceFormat::Json,
            _ => {
                return Err(SourceError::Unsupported {
                    file_id: file_id.to_string(),
                    reason: "only .csv and .json files are accepted".to_string(),
                })
            }
        };

        Ok((self.base_dir.join(trimmed), format))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceFormat {
    Csv,
    Json,
}

impl RecordSource for FileRecordSource {
    fn load(&self, file_id: &str) -> Result<RawTable, SourceError> {
        let (path, format) = self.resolve(file_id)?;
        let io_error = |source: std::io::Error| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SourceError::NotFound {
                    file_id: file_id.to_string(),
                }
            } else {
                SourceError::Io {
                    file_id: file_id.to_string(),
                    source,
                }
            }
        };

        let metadata = std::fs::metadata(&path).map_err(io_error)?;
        if !metadata.is_file() {
            return Err(SourceError::NotFound {
                file_id: file_id.to_string(),
            });
        }
        if metadata.len() > self.max_bytes {
            return Err(SourceError::TooLarge {
                file_id: file_id.to_string(),
                size: metadata.len(),
                limit: self.max_bytes,
            });
        }

        let file = std::fs::File::open(&path).map_err(io_error)?;
        debug!(path = %path.display(), bytes = metadata.len(), "reading roster source");

        let table = match format {
            SourceFormat::Csv => {
                RawTable::from_csv_reader(file).map_err(|source| SourceError::Csv {
                    file_id: file_id.to_string(),
                    source,
                })?
            }
            SourceFormat::Json => {
                let rows: Vec<Value> =
                    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|source| {
                        SourceError::Json {
                            file_id: file_id.to_string(),
                            source,
                        }
                    })?;
                RawTable::from_json_rows(rows).map_err(|reason| SourceError::InvalidShape {
                    file_id: file_id.to_string(),
                    reason,
                })?
            }
        };

        // A header row alone is as empty as `[]`.
        if table.is_empty() {
            return Err(SourceError::Empty {
                file_id: file_id.to_string(),
            });
        }
        Ok(table)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source file '{file_id}' not found")]
    NotFound { file_id: String },
    #[error("unsupported source file '{file_id}': {reason}")]
    Unsupported { file_id: String, reason: String },
    #[error("source file '{file_id}' is {size} bytes, above the {limit} byte limit")]
    TooLarge {
        file_id: String,
        size: u64,
        limit: u64,
    },
    #[error("invalid CSV data in '{file_id}': {source}")]
    Csv {
        file_id: String,
        #[source]
        source: csv::Error,
    },
    #[error("invalid JSON data in '{file_id}': {source}")]
    Json {
        file_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected layout in '{file_id}': {reason}")]
    InvalidShape { file_id: String, reason: String },
    #[error("source file '{file_id}' contains no records")]
    Empty { file_id: String },
    #[error("failed to read source file '{file_id}': {source}")]
    Io {
        file_id: String,
        #[source]
        source: std::io::Error,
    },
}
