//! Change-event to flat row transformer.
//!
//! Every decoded record becomes exactly one [`Row`]. Deleted rows keep only
//! the key, change type and timestamps; everything else is expanded from the
//! payload, with `flight_details` split into its six columns.

use avro_rs::types::Value;
use avrobq_core::Row;
use tracing::debug;

pub mod envelope;
pub mod flight;
pub mod time;

pub use envelope::{Change, ChangeEvent, Upsert};
pub use flight::FlightDetails;
pub use time::format_timestamp;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransformError {
    #[error("record is missing field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has an unexpected type, expected {expected}")]
    UnexpectedType {
        field: String,
        expected: &'static str,
    },

    #[error("field `{field}` holds an out-of-range timestamp {value}")]
    InvalidTimestamp { field: String, value: String },

    #[error("field `{field}` holds an unsupported value {kind}")]
    Unsupported { field: String, kind: String },

    #[error("flight_details `{value}` has {found} `//`-separated parts, expected 5")]
    FlightDetailsArity { value: String, found: usize },

    #[error("travel segment `{value}` has {found} `-`-separated parts, expected 2")]
    TravelArity { value: String, found: usize },
}

/// A transform failure tied to the position of the record in its file
#[derive(Debug, thiserror::Error)]
#[error("failed to transform record {index}")]
pub struct RecordError {
    pub index: usize,
    #[source]
    pub source: TransformError,
}

/// Transforms one decoded record.
pub fn transform(record: &Value) -> Result<Row, TransformError> {
    let event = ChangeEvent::from_value(record)?;
    match &event.change {
        Change::Deleted => Ok(deleted_row(&event)),
        Change::Upsert(upsert) => upsert_row(&event, upsert),
    }
}

/// Transforms a whole file, in order. The first failing record aborts.
pub fn transform_all(records: &[Value]) -> Result<Vec<Row>, RecordError> {
    let rows = records
        .iter()
        .enumerate()
        .map(|(index, record)| transform(record).map_err(|source| RecordError { index, source }))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(rows = rows.len(), "transformed records");
    Ok(rows)
}

/// Row for a deleted source row: the nine payload columns stay null.
pub fn deleted_row(event: &ChangeEvent) -> Row {
    Row {
        id: event.id.clone(),
        change_type: event.change_type.clone(),
        read_timestamp: format_timestamp(&event.read_timestamp),
        source_timestamp: format_timestamp(&event.source_timestamp),
        ..Row::default()
    }
}

pub fn upsert_row(event: &ChangeEvent, upsert: &Upsert) -> Result<Row, TransformError> {
    let details = FlightDetails::parse(&upsert.flight_details)?;
    Ok(Row {
        id: event.id.clone(),
        flight_date: Some(details.flight_date),
        flight_number: Some(details.flight_number),
        flight_class: Some(details.flight_class),
        distance: Some(details.distance),
        origin: Some(details.origin),
        destination: Some(details.destination),
        flow_card: Some(upsert.flow_card),
        bag_checked: Some(upsert.bag_checked.clone()),
        meal_type: Some(upsert.meal_type.clone()),
        change_type: event.change_type.clone(),
        read_timestamp: format_timestamp(&event.read_timestamp),
        source_timestamp: format_timestamp(&event.source_timestamp),
    })
}
