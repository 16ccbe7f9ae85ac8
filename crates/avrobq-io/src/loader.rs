use crate::avro::decode_container;
use avrobq_core::{LoaderError, Notification, ObjectReader, Outcome, RowSink};
use avrobq_tx::transform_all;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Substring that marks an object as a data file
pub const AVRO_MARKER: &str = ".avro";

/// Whether an object name refers to a data file.
///
/// Plain substring containment: `a.avro.tmp` and `x/.avro/y` both match.
pub fn is_data_file(name: &str) -> bool {
    name.contains(AVRO_MARKER)
}

/// Runs one notification through fetch, decode, transform and insert
pub struct Loader {
    reader: Arc<dyn ObjectReader>,
    sink: Arc<dyn RowSink>,
}

impl Loader {
    pub fn new(reader: Arc<dyn ObjectReader>, sink: Arc<dyn RowSink>) -> Self {
        Self { reader, sink }
    }

    pub async fn handle(&self, notification: &Notification) -> Result<Outcome, LoaderError> {
        let name = notification.object_name()?;
        if !is_data_file(name) {
            info!(object = name, "Folder event, passing");
            return Ok(Outcome::Skipped {
                object: name.to_string(),
            });
        }

        info!(object = name, "File event");
        if let Some(bucket) = &notification.data.bucket {
            debug!(
                event_bucket = %bucket,
                location = self.reader.location(),
                "Reading from configured location"
            );
        }

        let bytes = self.reader.read(name).await?;
        let records = decode_container(&bytes)?;
        let rows = transform_all(&records).map_err(|e| LoaderError::Transform {
            index: e.index,
            source: e.source.into(),
        })?;

        if rows.is_empty() {
            info!(object = name, "File has no records, nothing to insert");
            debug!(
                object = name,
                "Skipping the insert call: an empty insertAll batch is rejected by the warehouse"
            );
            return Ok(Outcome::Inserted {
                object: name.to_string(),
                rows: 0,
                row_errors: Vec::new(),
            });
        }

        let row_errors = self
            .sink
            .insert_rows(&rows)
            .await
            .map_err(|source| LoaderError::Sink {
                table: self.sink.table().to_string(),
                source,
            })?;

        if row_errors.is_empty() {
            info!(object = name, rows = rows.len(), table = %self.sink.table(), "Data inserted successfully");
        } else {
            error!(
                object = name,
                rows = rows.len(),
                rejected = row_errors.len(),
                "Encountered errors while inserting rows"
            );
            for row_error in &row_errors {
                error!("{}", row_error);
            }
        }

        Ok(Outcome::Inserted {
            object: name.to_string(),
            rows: rows.len(),
            row_errors,
        })
    }
}
