//! # avrobq I/O - storage, decoding, sinks and the loader
//!
//! This crate provides the concrete pieces around the transformer: reading
//! objects from storage, decoding Avro object containers, writing rows to a
//! warehouse, and the [`loader::Loader`] that runs one notification through
//! all of them.
//!
//! ## Features
//!
//! ### Storage
//! - **GCS**: via `object_store`, credentials from the environment
//! - **Local**: a directory standing in for a bucket
//!
//! ### Sinks
//! - **BigQuery**: `tabledata.insertAll` with per-row error reporting
//! - **Stdout**: JSON lines for dry runs
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use avrobq_core::{LoaderSpec, Notification};
//! use avrobq_io::{build_sink, loader::Loader, storage::build_reader};
//! use std::sync::Arc;
//!
//! # async fn example(spec: LoaderSpec) -> anyhow::Result<()> {
//! let loader = Loader::new(Arc::new(build_reader(&spec.source)?), build_sink(&spec.sink));
//! loader.handle(&Notification::for_object("airline/file.avro")).await?;
//! # Ok(())
//! # }
//! ```

use avrobq_core::{RowSink, SinkSpec, TableRef};
use std::sync::Arc;

/// Avro object container decoding
pub mod avro;

/// Notification handling: fetch, decode, transform, insert
pub mod loader;

/// BigQuery insertAll sink
pub mod sink_bigquery;

/// JSON lines sink for dry runs
pub mod sink_stdout;

/// Object storage readers
pub mod storage;

/// Builds the sink for the configured target
pub fn build_sink(spec: &SinkSpec) -> Arc<dyn RowSink> {
    match spec {
        SinkSpec::BigQuery(bq) => Arc::new(sink_bigquery::BigQuerySink::new(bq)),
        SinkSpec::Stdout { dataset, table } => Arc::new(sink_stdout::StdoutSink::new(TableRef {
            project: None,
            dataset: dataset.clone(),
            table: table.clone(),
        })),
    }
}
