//! # avrobq Core - shared types for the Avro-to-BigQuery loader
//!
//! This crate provides the foundational types, traits, and configuration used by the
//! loader. It defines the trigger notification, the flat output row, the error and
//! outcome types, and the storage/warehouse capabilities the loader is built from.
//!
//! ## Key Components
//!
//! - **Notification**: the object-change event that starts one invocation
//! - **Row**: the 13-column flat row written to the warehouse
//! - **Capabilities**: [`ObjectReader`] and [`RowSink`] traits, injected into the loader
//! - **Configuration**: YAML-based [`LoaderSpec`]
//! - **Error Handling**: [`LoaderError`] for aborts, [`Outcome`] for completed runs
//!
//! ## Example Usage
//!
//! ```rust
//! use avrobq_core::{LoaderSpec, Notification};
//!
//! # fn example() -> anyhow::Result<()> {
//! let spec = LoaderSpec::from_yaml("name: airline\nsource: { type: gcs }\nsink: { type: stdout }\n")?;
//! let event: Notification = serde_json::from_str(r#"{"data": {"name": "dir/file.avro"}}"#)?;
//! assert_eq!(event.object_name()?, "dir/file.avro");
//! # let _ = spec;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Object-change notification delivered by the triggering runtime
///
/// Mirrors the structured CloudEvent a storage trigger delivers. Only
/// `data.name` is consumed; everything else is carried for logging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Notification {
    /// CloudEvent id, when the runtime provides one
    #[serde(default)]
    pub id: Option<String>,

    /// CloudEvent type, e.g. `google.cloud.storage.object.v1.finalized`
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,

    /// Storage object metadata
    #[serde(default)]
    pub data: ObjectEvent,
}

/// Storage object metadata carried in a [`Notification`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectEvent {
    /// Full object name inside the bucket
    #[serde(default)]
    pub name: Option<String>,

    /// Bucket the event came from (informational; the loader reads from its configured bucket)
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default, rename = "contentType")]
    pub content_type: Option<String>,
}

impl Notification {
    /// Builds a notification for a single object name
    pub fn for_object(name: impl Into<String>) -> Self {
        Self {
            data: ObjectEvent {
                name: Some(name.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Parses a notification from its JSON encoding
    pub fn from_json(raw: &str) -> Result<Self, LoaderError> {
        serde_json::from_str(raw).map_err(LoaderError::InvalidNotification)
    }

    /// Returns the object name, failing when the event carries none
    pub fn object_name(&self) -> Result<&str, LoaderError> {
        self.data
            .name
            .as_deref()
            .ok_or(LoaderError::MissingObjectName)
    }
}

/// One flat warehouse row
///
/// Always serializes to exactly these 13 keys, in this order. Fields that a
/// deleted record does not carry serialize as `null`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Row {
    pub id: serde_json::Value,
    pub flight_date: Option<String>,
    pub flight_number: Option<String>,
    pub flight_class: Option<String>,
    pub distance: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub flow_card: Option<bool>,
    pub bag_checked: Option<serde_json::Value>,
    pub meal_type: Option<serde_json::Value>,
    pub change_type: serde_json::Value,
    pub read_timestamp: String,
    pub source_timestamp: String,
}

/// Column names of [`Row`], in serialization order
pub const ROW_COLUMNS: [&str; 13] = [
    "id",
    "flight_date",
    "flight_number",
    "flight_class",
    "distance",
    "origin",
    "destination",
    "flow_card",
    "bag_checked",
    "meal_type",
    "change_type",
    "read_timestamp",
    "source_timestamp",
];

/// Fully qualified warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    #[serde(default)]
    pub project: Option<String>,
    pub dataset: String,
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.project {
            Some(project) => write!(f, "{}.{}.{}", project, self.dataset, self.table),
            None => write!(f, "{}.{}", self.dataset, self.table),
        }
    }
}

/// A row the warehouse rejected, as reported by the insert call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// Position of the row in the submitted batch
    pub index: usize,
    pub errors: Vec<ErrorDetail>,
}

/// One reason a row was rejected
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}:", self.index)?;
        for detail in &self.errors {
            write!(f, " [{}] {}", detail.reason, detail.message)?;
            if !detail.location.is_empty() {
                write!(f, " (at {})", detail.location)?;
            }
        }
        Ok(())
    }
}

/// Result of an invocation that did not abort
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The object is not a data file (e.g. a folder marker); nothing was read or written
    Skipped { object: String },

    /// The file was decoded, transformed and submitted
    ///
    /// `row_errors` lists rows the warehouse rejected. A non-empty list still
    /// counts as a completed invocation.
    Inserted {
        object: String,
        rows: usize,
        row_errors: Vec<RowError>,
    },
}

/// Error types that abort an invocation
///
/// None of these are recovered locally; they surface to the hosting runtime,
/// which owns any retry policy.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("invalid notification payload: {0}")]
    InvalidNotification(#[source] serde_json::Error),

    #[error("notification has no object name")]
    MissingObjectName,

    #[error("failed to read object {name} from {location}")]
    Fetch {
        name: String,
        location: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode Avro container")]
    Decode(#[source] anyhow::Error),

    #[error("failed to transform record {index}")]
    Transform {
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("insert into {table} failed")]
    Sink {
        table: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Read capability over the configured storage location
#[async_trait]
pub trait ObjectReader: Send + Sync {
    /// Human-readable location, e.g. `gs://my-bucket`
    fn location(&self) -> &str;

    /// Reads the full content of one object
    async fn read(&self, name: &str) -> Result<Vec<u8>, LoaderError>;
}

/// Batch insert capability over one warehouse table
#[async_trait]
pub trait RowSink: Send + Sync {
    /// Table the rows land in
    fn table(&self) -> &TableRef;

    /// Inserts all rows in one call
    ///
    /// Returns the rows the warehouse rejected, possibly none. An `Err` means
    /// the call itself failed.
    async fn insert_rows(&self, rows: &[Row]) -> anyhow::Result<Vec<RowError>>;
}

/// Complete loader specification loaded from YAML configuration
///
/// # Example YAML Configuration
///
/// ```yaml
/// name: "airline-cdc"
/// source:
///   type: gcs
///   bucket: "my-datastream-data"
/// sink:
///   type: bigquery
///   project: "my-project"
///   dataset: "airline"
///   table: "airline_details"
///   access_token_env: "BIGQUERY_ACCESS_TOKEN"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderSpec {
    /// Human-readable name of the loader
    pub name: String,
    pub source: SourceSpec,
    pub sink: SinkSpec,
}

impl LoaderSpec {
    pub fn from_yaml(raw: &str) -> Result<Self, LoaderError> {
        serde_yaml::from_str(raw).map_err(|e| LoaderError::Config(e.to_string()))
    }
}

/// Where data files are read from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SourceSpec {
    /// Google Cloud Storage bucket; credentials come from the environment
    #[serde(rename = "gcs")]
    Gcs {
        #[serde(default = "default_bucket")]
        bucket: String,
    },
    /// Local directory standing in for a bucket
    #[serde(rename = "local")]
    Local { root: String },
}

/// Configuration for the BigQuery insertAll sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BigQuerySinkSpec {
    pub project: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_table")]
    pub table: String,
    /// API base URL, overridable for emulators
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding an OAuth access token
    #[serde(default)]
    pub access_token_env: Option<String>,
}

impl BigQuerySinkSpec {
    pub fn table_ref(&self) -> TableRef {
        TableRef {
            project: Some(self.project.clone()),
            dataset: self.dataset.clone(),
            table: self.table.clone(),
        }
    }
}

/// Where rows are written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SinkSpec {
    #[serde(rename = "bigquery")]
    BigQuery(BigQuerySinkSpec),
    /// Print rows as JSON lines instead of inserting them
    #[serde(rename = "stdout")]
    Stdout {
        #[serde(default = "default_dataset")]
        dataset: String,
        #[serde(default = "default_table")]
        table: String,
    },
}

fn default_bucket() -> String {
    "my-datastream-data".to_string()
}

fn default_dataset() -> String {
    "airline".to_string()
}

fn default_table() -> String {
    "airline_details".to_string()
}

fn default_endpoint() -> String {
    "https://bigquery.googleapis.com".to_string()
}
