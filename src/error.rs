use thiserror::Error;

/// Telemetry store failures. The affected window or wearer is skipped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("Telemetry source unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed telemetry query: {0}")]
    MalformedQuery(String),

    #[error("Telemetry decode error: {0}")]
    Decode(String),
}

/// Record store failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Storage serialization error: {0}")]
    Serialization(String),

    #[error("Record {id} not found in {table}")]
    NotFound { table: &'static str, id: i64 },

    #[error("Rejected record for {table}: {reason}")]
    Rejected { table: &'static str, reason: String },
}

/// A derived record failed its shape check before being handed out.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{record}: wearer identity is empty")]
    EmptyWearer { record: &'static str },

    #[error("{record}: start {start} is not before end {end}")]
    InvalidSpan {
        record: &'static str,
        start: String,
        end: String,
    },

    #[error("{record}: duration {duration} does not match its span ({expected})")]
    DurationMismatch {
        record: &'static str,
        duration: f64,
        expected: f64,
    },

    #[error("{record}: hardware address {address:?} is not colon-delimited")]
    Address { record: &'static str, address: String },

    #[error("{record}: sample count must be positive")]
    EmptySegment { record: &'static str },
}

/// Fatal setup failures: nothing is processed when one of these is raised.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid parameter {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("Missing timestamp")]
    Missing,

    #[error("Unparsable timestamp {0:?}")]
    Unparsable(String),
}

/// Diagnostic export failures; never affect detection results.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Export I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Export serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
