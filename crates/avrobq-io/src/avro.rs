use avro_rs::types::Value;
use avro_rs::Reader;
use avrobq_core::LoaderError;
use tracing::debug;

/// Decodes a complete Avro object container file.
///
/// The writer schema embedded in the header is used; every record is
/// materialized in file order.
pub fn decode_container(bytes: &[u8]) -> Result<Vec<Value>, LoaderError> {
    let reader = Reader::new(bytes).map_err(|e| LoaderError::Decode(e.into()))?;
    let records = reader
        .collect::<Result<Vec<Value>, _>>()
        .map_err(|e| LoaderError::Decode(e.into()))?;
    debug!(records = records.len(), "Decoded Avro container");
    Ok(records)
}
