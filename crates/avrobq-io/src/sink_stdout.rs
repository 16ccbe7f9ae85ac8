use anyhow::{anyhow, Result};
use async_trait::async_trait;
use avrobq_core::{Row, RowError, RowSink, TableRef};
use std::io::Write;
use std::sync::Mutex;
use tracing::info;

/// Prints rows as JSON lines instead of inserting them
///
/// Used for dry runs; never rejects a row.
pub struct StdoutSink {
    table: TableRef,
    out: Mutex<Box<dyn Write + Send>>,
}

impl StdoutSink {
    pub fn new(table: TableRef) -> Self {
        Self::with_writer(table, Box::new(std::io::stdout()))
    }

    pub fn with_writer(table: TableRef, out: Box<dyn Write + Send>) -> Self {
        Self {
            table,
            out: Mutex::new(out),
        }
    }
}

#[async_trait]
impl RowSink for StdoutSink {
    fn table(&self) -> &TableRef {
        &self.table
    }

    async fn insert_rows(&self, rows: &[Row]) -> Result<Vec<RowError>> {
        let mut out = self.out.lock().map_err(|_| anyhow!("stdout sink poisoned"))?;
        for row in rows {
            serde_json::to_writer(&mut *out, row)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        info!("Printed {} rows for {}", rows.len(), self.table);
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct Shared(Arc<Mutex<Vec<u8>>>);

    impl Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test_log::test(tokio::test)]
    async fn writes_one_line_per_row() {
        let buf = Shared::default();
        let table = TableRef {
            project: None,
            dataset: "airline".into(),
            table: "airline_details".into(),
        };
        let sink = StdoutSink::with_writer(table, Box::new(buf.clone()));
        let rows = vec![
            Row {
                id: 1.into(),
                ..Row::default()
            },
            Row {
                id: 2.into(),
                flow_card: Some(true),
                ..Row::default()
            },
        ];
        assert!(sink.insert_rows(&rows).await.unwrap().is_empty());

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Row = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second, rows[1]);
    }
}
