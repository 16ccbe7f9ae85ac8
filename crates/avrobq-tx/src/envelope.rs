//! Typed view over one decoded change-event envelope.
//!
//! Datastream-style exports wrap each changed row as
//! `{ source_metadata: {..}, payload: {..}, read_timestamp, source_timestamp, .. }`.
//! Nullable fields arrive as `["null", T]` unions and are unwrapped here.

use crate::time::{format_timestamp, from_epoch_days, from_micros, from_millis};
use crate::TransformError;
use avro_rs::types::Value;
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Number, Value as JsonValue};

/// One change event, tagged by whether the source row was deleted
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub id: JsonValue,
    pub change_type: JsonValue,
    pub read_timestamp: DateTime<FixedOffset>,
    pub source_timestamp: DateTime<FixedOffset>,
    pub change: Change,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Only the key and metadata are carried
    Deleted,
    Upsert(Upsert),
}

/// Payload columns of an inserted or updated row
#[derive(Debug, Clone, PartialEq)]
pub struct Upsert {
    pub flight_details: String,
    /// Whether `flow_card` compares equal to `1`
    pub flow_card: bool,
    pub bag_checked: JsonValue,
    pub meal_type: JsonValue,
}

impl ChangeEvent {
    pub fn from_value(record: &Value) -> Result<Self, TransformError> {
        let metadata = required(record, "source_metadata", "source_metadata")?;
        let payload = required(record, "payload", "payload")?;

        let deleted = match required(metadata, "is_deleted", "source_metadata.is_deleted")? {
            Value::Boolean(flag) => *flag,
            Value::Null => false,
            _ => return Err(unexpected("source_metadata.is_deleted", "boolean")),
        };

        let change = if deleted {
            Change::Deleted
        } else {
            let flight_details = match required(payload, "flight_details", "payload.flight_details")? {
                Value::String(s) => s.clone(),
                _ => return Err(unexpected("payload.flight_details", "string")),
            };
            let flow_card = equals_one(required(payload, "flow_card", "payload.flow_card")?);
            Change::Upsert(Upsert {
                flight_details,
                flow_card,
                bag_checked: to_json(
                    "payload.bag_checked",
                    required(payload, "bag_checked", "payload.bag_checked")?,
                )?,
                meal_type: to_json(
                    "payload.meal_type",
                    required(payload, "meal_type", "payload.meal_type")?,
                )?,
            })
        };

        Ok(Self {
            id: to_json("payload.id", required(payload, "id", "payload.id")?)?,
            change_type: to_json(
                "source_metadata.change_type",
                required(metadata, "change_type", "source_metadata.change_type")?,
            )?,
            read_timestamp: timestamp(
                "read_timestamp",
                required(record, "read_timestamp", "read_timestamp")?,
            )?,
            source_timestamp: timestamp(
                "source_timestamp",
                required(record, "source_timestamp", "source_timestamp")?,
            )?,
            change,
        })
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.change, Change::Deleted)
    }
}

/// Numeric equality with `1`; booleans count as `0`/`1`.
fn equals_one(value: &Value) -> bool {
    match value {
        Value::Int(i) => *i == 1,
        Value::Long(l) => *l == 1,
        Value::Boolean(b) => *b,
        Value::Float(f) => *f == 1.0,
        Value::Double(d) => *d == 1.0,
        _ => false,
    }
}

fn unwrap_union(value: &Value) -> &Value {
    match value {
        Value::Union(inner) => unwrap_union(inner),
        other => other,
    }
}

/// Looks up a field of a record (or map) value.
fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
    match unwrap_union(value) {
        Value::Record(fields) => fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, v)| unwrap_union(v)),
        Value::Map(entries) => entries.get(name).map(unwrap_union),
        _ => None,
    }
}

fn required<'a>(value: &'a Value, name: &str, path: &str) -> Result<&'a Value, TransformError> {
    field(value, name).ok_or_else(|| TransformError::MissingField(path.to_string()))
}

fn unexpected(path: &str, expected: &'static str) -> TransformError {
    TransformError::UnexpectedType {
        field: path.to_string(),
        expected,
    }
}

fn timestamp(path: &str, value: &Value) -> Result<DateTime<FixedOffset>, TransformError> {
    let parsed = match value {
        Value::TimestampMicros(us) => from_micros(*us),
        Value::TimestampMillis(ms) => from_millis(*ms),
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok(),
        _ => return Err(unexpected(path, "timestamp")),
    };
    parsed.ok_or_else(|| TransformError::InvalidTimestamp {
        field: path.to_string(),
        value: format!("{:?}", value),
    })
}

/// Converts a decoded Avro value into JSON for pass-through columns.
pub fn to_json(path: &str, value: &Value) -> Result<JsonValue, TransformError> {
    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::from(*i),
        Value::Long(l) => JsonValue::from(*l),
        Value::Float(f) => float(f64::from(*f)),
        Value::Double(d) => float(*d),
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Enum(_, symbol) => JsonValue::String(symbol.clone()),
        Value::Bytes(bytes) | Value::Fixed(_, bytes) => {
            JsonValue::Array(bytes.iter().map(|b| JsonValue::from(*b)).collect())
        }
        Value::Union(inner) => to_json(path, inner)?,
        Value::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| to_json(path, item))
                .collect::<Result<_, _>>()?,
        ),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_json(path, v)?)))
                .collect::<Result<Map<_, _>, TransformError>>()?,
        ),
        Value::Record(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(k, v)| Ok((k.clone(), to_json(path, v)?)))
                .collect::<Result<Map<_, _>, TransformError>>()?,
        ),
        Value::Date(days) => match from_epoch_days(*days) {
            Some(date) => JsonValue::String(date.format("%Y-%m-%d").to_string()),
            None => {
                return Err(TransformError::InvalidTimestamp {
                    field: path.to_string(),
                    value: format!("{:?}", value),
                })
            }
        },
        Value::TimeMillis(ms) => JsonValue::from(*ms),
        Value::TimeMicros(us) => JsonValue::from(*us),
        Value::TimestampMillis(_) | Value::TimestampMicros(_) => {
            JsonValue::String(format_timestamp(&timestamp(path, value)?))
        }
        Value::Uuid(uuid) => JsonValue::String(uuid.to_string()),
        other => {
            return Err(TransformError::Unsupported {
                field: path.to_string(),
                kind: format!("{:?}", other),
            })
        }
    };
    Ok(json)
}

fn float(value: f64) -> JsonValue {
    Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}
